use colored::Colorize;

pub fn header(title: &str) {
    println!("{}", title.bold().underline());
}

pub fn subheader(title: &str) {
    println!("{}", title.bold());
}

pub fn hint(msg: &str) {
    println!("{} {}", "hint:".cyan().bold(), msg.dimmed());
}

pub fn info(msg: &str) {
    eprintln!("{} {}", "info:".blue().bold(), msg);
}

pub fn warn(msg: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), msg);
}

pub fn error(msg: &str) {
    eprintln!("{} {}", "error:".red().bold(), msg);
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// One line of a collaborator list; `marker` is `+`, `-` or blank.
pub fn member_line(marker: char, email: &str) -> String {
    match marker {
        '+' => format!("  {} {}", "+".green().bold(), email.green()),
        '-' => format!("  {} {}", "-".red().bold(), email.red()),
        _ => format!("    {}", email)
    }
}

use colored::Colorize;
use perm_watch::PermWatchError;

#[derive(Debug)]
pub struct UxError {
    pub what: String,
    pub why: Option<String>,
    pub how_to_fix: Vec<String>,
    pub suggested_command: Option<String>
}

impl UxError {
    pub fn new(what: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            why: None,
            how_to_fix: Vec::new(),
            suggested_command: None
        }
    }

    pub fn why(mut self, reason: impl Into<String>) -> Self {
        self.why = Some(reason.into());
        self
    }

    pub fn fix(mut self, suggestion: impl Into<String>) -> Self {
        self.how_to_fix.push(suggestion.into());
        self
    }

    pub fn suggest(mut self, cmd: impl Into<String>) -> Self {
        self.suggested_command = Some(cmd.into());
        self
    }

    pub fn display(&self) {
        eprintln!();
        eprintln!("{} {}", "error:".red().bold(), self.what.white().bold());

        if let Some(why) = &self.why {
            eprintln!("       {}", why.dimmed());
        }

        if !self.how_to_fix.is_empty() {
            eprintln!();
            eprintln!("{}", "How to fix:".yellow().bold());
            for (i, fix) in self.how_to_fix.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, fix);
            }
        }

        if let Some(cmd) = &self.suggested_command {
            eprintln!();
            eprintln!("{}", "Try this:".green().bold());
            eprintln!("  $ {}", cmd.cyan());
        }
        eprintln!();
    }
}

impl std::fmt::Display for UxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.what)
    }
}

impl std::error::Error for UxError {}

/// Maps a library failure to something a person at the terminal can act on.
pub fn explain(err: &PermWatchError) -> UxError {
    match err {
        PermWatchError::AuthFailure(reason) => UxError::new("Not authorized to access Google Drive")
            .why(reason.clone())
            .fix("Make sure credentials.json holds an OAuth client for an installed app")
            .fix("Re-run the consent flow to refresh the saved token")
            .suggest("permwatch auth"),
        PermWatchError::InvalidTarget(reason) => UxError::new("Invalid file id")
            .why(reason.clone())
            .fix("Copy the id from the file's Drive URL, between /d/ and /edit")
            .suggest("permwatch files"),
        PermWatchError::ConfigError(reason) if reason.contains("callback_url") => {
            UxError::new("No public callback URL configured")
                .why(reason.clone())
                .fix("Expose the webhook port through a tunnel such as ngrok")
                .fix("Set callback_url in the config file or PERMWATCH_CALLBACK_URL")
                .suggest("PERMWATCH_CALLBACK_URL=https://<tunnel>/updates permwatch serve --watch <FILE_ID>")
        }
        PermWatchError::ConfigError(reason) => UxError::new("Invalid configuration").why(reason.clone()),
        PermWatchError::RegistrationFailure { message, .. } => {
            UxError::new("Drive refused the watch registration")
                .why(message.clone())
                .fix("Check that the callback URL is HTTPS and publicly reachable")
                .fix("Verify the domain of the callback URL with Google if required")
        }
        other => UxError::new(other.to_string())
    }
}

/// Prints a command failure, with fix hints when the cause is known.
pub fn report(err: &anyhow::Error) {
    match err.downcast_ref::<PermWatchError>() {
        Some(e) => explain(e).display(),
        None => crate::output::error(&format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ux_error_builder() {
        let err = UxError::new("Something failed")
            .why("Because of reasons")
            .fix("Try this")
            .fix("Or this")
            .suggest("permwatch auth");

        assert_eq!(err.what, "Something failed");
        assert_eq!(err.why, Some("Because of reasons".to_string()));
        assert_eq!(err.how_to_fix.len(), 2);
        assert_eq!(err.suggested_command, Some("permwatch auth".to_string()));
        assert_eq!(err.to_string(), "Something failed");
    }

    #[test]
    fn test_auth_failure_suggests_auth_command() {
        let ux = explain(&PermWatchError::AuthFailure("token revoked".to_string()));
        assert_eq!(ux.suggested_command.as_deref(), Some("permwatch auth"));
        assert_eq!(ux.why.as_deref(), Some("token revoked"));
    }

    #[test]
    fn test_missing_callback_points_at_env_var() {
        let ux = explain(&PermWatchError::ConfigError(
            "callback_url must be set before subscribing to a file".to_string()
        ));
        assert!(ux.how_to_fix.iter().any(|f| f.contains("PERMWATCH_CALLBACK_URL")));
    }

    #[test]
    fn test_other_errors_keep_message() {
        let ux = explain(&PermWatchError::ApiError {
            status: 404,
            message: "File not found".to_string()
        });
        assert!(ux.what.contains("File not found"));
        assert!(ux.suggested_command.is_none());
    }

    #[test]
    fn test_display_does_not_panic() {
        explain(&PermWatchError::InvalidTarget("bad".to_string())).display();
    }
}

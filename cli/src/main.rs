use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod app;
mod commands;
mod output;
mod prompt;
mod sink;
mod ux_error;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command.unwrap_or(Commands::Menu) {
        Commands::Menu => commands::menu::run(config).await,
        Commands::Serve(args) => commands::serve::run(args, config).await,
        Commands::Auth => commands::auth::run(config).await,
        Commands::Files(args) => commands::files::run(args, config).await,
        Commands::Download(args) => commands::download::run(args, config).await,
        Commands::Users(args) => commands::users::run(args, config).await
    };

    if let Err(err) = result {
        ux_error::report(&err);
        std::process::exit(1);
    }
    Ok(())
}

pub mod auth;
pub mod download;
pub mod files;
pub mod menu;
pub mod serve;
pub mod users;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "permwatch",
    author,
    version,
    about = "Permwatch - watch who can access a Google Drive file",
    long_about = "Subscribes to change notifications for one Google Drive file and reports \
                  collaborators who gained or lost access.\n\nRun without a command for the \
                  interactive menu. Settings come from an optional TOML file and PERMWATCH_* \
                  environment variables."
)]
pub struct Cli {
    #[arg(long, global = true, env = "PERMWATCH_CONFIG", help = "Path to a TOML config file")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Interactive menu with the webhook server running (default)")]
    Menu,

    #[command(about = "Run the webhook server, optionally watching a file")]
    Serve(serve::ServeArgs),

    #[command(about = "Authorize access to Google Drive and save the token")]
    Auth,

    #[command(about = "List files in your Drive")]
    Files(files::FilesArgs),

    #[command(about = "Download a file's content")]
    Download(download::DownloadArgs),

    #[command(about = "List the users who can access a file")]
    Users(users::UsersArgs)
}

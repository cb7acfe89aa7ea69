use crate::app::App;
use crate::output;
use anyhow::Result;
use clap::Args;
use perm_watch::{DriveClient, SessionProvider};
use std::path::Path;

#[derive(Args)]
pub struct FilesArgs {
    #[arg(long, short = 'n', default_value_t = 10, help = "Number of files to show")]
    pub count: u32,

    #[arg(long)]
    pub json: bool
}

pub async fn run(args: FilesArgs, config_path: Option<&Path>) -> Result<()> {
    let app = App::load(config_path)?;
    list(&app, args.count, args.json).await
}

pub async fn list(app: &App, count: u32, json: bool) -> Result<()> {
    let session = app.sessions.session().await?;
    let files = app.drive.list_files(&session, count).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
        return Ok(());
    }

    if files.is_empty() {
        output::info("No files found.");
        return Ok(());
    }

    output::header("Files");
    for file in &files {
        println!("  {} ({})", file.name, file.id);
    }
    Ok(())
}

use crate::app::App;
use crate::output;
use anyhow::Result;
use clap::Args;
use perm_watch::drive::download_target;
use perm_watch::subscription::validate_file_id;
use perm_watch::{DriveClient, SessionProvider};
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct DownloadArgs {
    #[arg(help = "Drive file id")]
    pub file_id: String,

    #[arg(long, help = "Local file name without extension (defaults to the file id)")]
    pub name: Option<String>,

    #[arg(long, short = 'e', default_value = "", help = "Extension of the file on Drive, e.g. pdf")]
    pub extension: String,

    #[arg(long, help = "Directory to write into (overrides download_dir)")]
    pub dir: Option<PathBuf>
}

pub async fn run(args: DownloadArgs, config_path: Option<&Path>) -> Result<()> {
    validate_file_id(&args.file_id)?;
    let app = App::load(config_path)?;
    let dir = args.dir.unwrap_or_else(|| app.config.download_dir.clone());
    let name = args.name.unwrap_or_else(|| args.file_id.clone());

    fetch(&app, &args.file_id, &dir, &name, &args.extension).await
}

pub async fn fetch(
    app: &App,
    file_id: &str,
    dir: &Path,
    name: &str,
    extension: &str
) -> Result<()> {
    validate_file_id(file_id)?;
    let dest = download_target(dir, name, extension);
    let session = app.sessions.session().await?;
    let bytes = app.drive.download_file(&session, file_id, &dest).await?;

    output::success(&format!("Saved {} ({} bytes)", dest.display(), bytes));
    Ok(())
}

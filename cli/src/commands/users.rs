use crate::app::App;
use crate::output;
use anyhow::Result;
use clap::Args;
use perm_watch::SessionProvider;
use perm_watch::snapshot::fetch_snapshot;
use perm_watch::subscription::validate_file_id;
use std::path::Path;

#[derive(Args)]
pub struct UsersArgs {
    #[arg(help = "Drive file id")]
    pub file_id: String,

    #[arg(long)]
    pub json: bool
}

pub async fn run(args: UsersArgs, config_path: Option<&Path>) -> Result<()> {
    validate_file_id(&args.file_id)?;
    let app = App::load(config_path)?;
    list(&app, &args.file_id, args.json).await
}

pub async fn list(app: &App, file_id: &str, json: bool) -> Result<()> {
    validate_file_id(file_id)?;
    let session = app.sessions.session().await?;
    let snapshot = fetch_snapshot(app.drive.as_ref(), &session, file_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    output::header(&format!("Users of {}", file_id));
    if snapshot.is_empty() {
        output::hint("No user has individual access to this file");
    }
    for email in snapshot.iter() {
        println!("{}", output::member_line(' ', email.as_str()));
    }
    Ok(())
}

use crate::output;
use crate::prompt;
use anyhow::Result;
use perm_watch::auth::AuthorizedUser;
use perm_watch::{InstalledAppFlow, PermWatchConfig};
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = PermWatchConfig::load(config_path)?;
    authorize(&config).await
}

/// Runs the consent flow when no token has been saved yet.
pub async fn ensure_authorized(config: &PermWatchConfig) -> Result<()> {
    if AuthorizedUser::load(&config.token_path).await?.is_some() {
        return Ok(());
    }

    output::warn(&format!(
        "No saved authorization at {}",
        config.token_path.display()
    ));
    authorize(config).await
}

pub async fn authorize(config: &PermWatchConfig) -> Result<()> {
    let flow = InstalledAppFlow::from_config(config).await?;

    output::header("Authorize Google Drive access");
    println!();
    println!("Open this URL in your browser and grant access:");
    println!();
    println!("  {}", flow.authorization_url());
    println!();
    output::hint("After consenting, paste the code or the whole address you were redirected to");

    let input = prompt::blocking(|p| p.text("Authorization code", None)).await?;
    let user = flow.exchange_code(&input).await?;
    user.save(&config.token_path).await?;

    output::success(&format!(
        "Authorization saved to {}",
        config.token_path.display()
    ));
    Ok(())
}

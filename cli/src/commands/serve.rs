use crate::app::App;
use crate::output;
use anyhow::Result;
use clap::Args;
use perm_watch::subscription::validate_file_id;
use std::path::Path;
use tracing::{info, warn};

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long, value_name = "FILE_ID", help = "Subscribe to this file once the server is up")]
    pub watch: Option<String>
}

pub async fn run(args: ServeArgs, config_path: Option<&Path>) -> Result<()> {
    if let Some(file_id) = &args.watch {
        validate_file_id(file_id)?;
    }

    let app = App::load(config_path)?;
    let server = app.webhook_server();
    let server_task = tokio::spawn(async move { server.run_until(shutdown_signal()).await });

    output::info(&format!(
        "Webhook server listening on {}",
        app.config.listen_addr()
    ));

    if let Some(file_id) = args.watch.as_deref() {
        if let Err(err) = watch(&app, file_id).await {
            server_task.abort();
            return Err(err);
        }
    }

    server_task.await??;
    Ok(())
}

/// Subscribes to `file_id` and tells the user which channel now delivers.
pub async fn watch(app: &App, file_id: &str) -> Result<()> {
    let target = app.subscriber.subscribe(file_id).await?;

    match target.channel {
        Some(channel) => {
            output::success(&format!(
                "Watching {} for permission changes (channel {})",
                file_id, channel.channel_id
            ));
            if let Some(expiration) = channel.expiration {
                output::hint(&format!(
                    "The channel expires at {}; subscribe again before then",
                    expiration
                ));
            }
        }
        None => output::success(&format!("Watching {} for permission changes", file_id))
    }
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Cannot listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

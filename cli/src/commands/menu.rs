use super::{auth, download, files, serve, users};
use crate::app::App;
use crate::prompt::{self, Prompter};
use crate::{output, ux_error};
use anyhow::Result;
use std::path::Path;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    ListFiles,
    Download,
    ListUsers,
    Subscribe,
    Quit
}

impl MenuAction {
    const ALL: [MenuAction; 5] = [
        MenuAction::ListFiles,
        MenuAction::Download,
        MenuAction::ListUsers,
        MenuAction::Subscribe,
        MenuAction::Quit
    ];

    fn label(self) -> &'static str {
        match self {
            MenuAction::ListFiles => "List Files",
            MenuAction::Download => "Download a File",
            MenuAction::ListUsers => "List File Users",
            MenuAction::Subscribe => "Subscribe to File Changes",
            MenuAction::Quit => "Quit"
        }
    }

    fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or(MenuAction::Quit)
    }
}

#[derive(Debug, PartialEq)]
enum MenuRequest {
    ListFiles {
        count: u32
    },
    Download {
        file_id: String,
        name: String,
        extension: String
    },
    ListUsers {
        file_id: String
    },
    Subscribe {
        file_id: String
    },
    Quit
}

fn ask(p: &Prompter) -> Result<MenuRequest> {
    let labels: Vec<&str> = MenuAction::ALL.iter().map(|a| a.label()).collect();
    let action = MenuAction::from_index(p.select("What do you want to do?", &labels)?);

    Ok(match action {
        MenuAction::ListFiles => MenuRequest::ListFiles {
            count: p.count("Enter the number of files you want to display", 10)?
        },
        MenuAction::Download => {
            let file_id = p.file_id()?;
            let extension = p.text(
                "Enter the file extension of the file on Google Drive (e.g. docx, pdf)",
                Some(String::new())
            )?;
            let name = p.text(
                "Enter the name for the file on your local computer",
                Some(file_id.clone())
            )?;
            MenuRequest::Download {
                file_id,
                name,
                extension
            }
        }
        MenuAction::ListUsers => MenuRequest::ListUsers {
            file_id: p.file_id()?
        },
        MenuAction::Subscribe => MenuRequest::Subscribe {
            file_id: p.file_id()?
        },
        MenuAction::Quit => MenuRequest::Quit
    })
}

/// Interactive loop with the webhook server running alongside.
///
/// A failed action is reported and the menu keeps going; only Quit, a prompt
/// error or the server stopping ends the loop.
pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let app = App::load(config_path)?;
    auth::ensure_authorized(&app.config).await?;

    let server = app.webhook_server();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server_task = tokio::spawn(async move {
        server
            .run_until(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    output::info(&format!(
        "Webhook server listening on {} for file change notifications",
        app.config.listen_addr()
    ));
    if app.config.callback_url.is_none() {
        output::hint("Set PERMWATCH_CALLBACK_URL to the public address of /updates before subscribing");
    }

    loop {
        if server_task.is_finished() {
            break;
        }

        let result = match prompt::blocking(ask).await? {
            MenuRequest::Quit => break,
            MenuRequest::ListFiles { count } => files::list(&app, count, false).await,
            MenuRequest::Download {
                file_id,
                name,
                extension
            } => download::fetch(&app, &file_id, &app.config.download_dir, &name, &extension).await,
            MenuRequest::ListUsers { file_id } => users::list(&app, &file_id, false).await,
            MenuRequest::Subscribe { file_id } => serve::watch(&app, &file_id).await
        };

        if let Err(err) = result {
            ux_error::report(&err);
        }
    }

    println!("Exiting application...");
    let _ = stop_tx.send(());
    server_task.await??;
    Ok(())
}

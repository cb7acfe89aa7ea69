use crate::sink::ConsoleSink;
use anyhow::Result;
use perm_watch::{
    GoogleDriveClient, OAuthSessionProvider, PermWatchConfig, Reconciler, Subscriber, WebhookServer
};
use std::path::Path;
use std::sync::Arc;

/// Everything a command needs, wired from one configuration.
pub struct App {
    pub config: PermWatchConfig,
    pub sessions: Arc<OAuthSessionProvider>,
    pub drive: Arc<GoogleDriveClient>,
    pub reconciler: Arc<Reconciler>,
    pub subscriber: Subscriber
}

impl App {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = PermWatchConfig::load(config_path)?;
        Self::from_config(config)
    }

    pub fn from_config(config: PermWatchConfig) -> Result<Self> {
        let sessions = Arc::new(OAuthSessionProvider::from_config(&config)?);
        let drive = Arc::new(GoogleDriveClient::new(config.api_base_url.clone())?);
        let reconciler = Arc::new(Reconciler::new(
            drive.clone(),
            sessions.clone(),
            Arc::new(ConsoleSink),
            config.fetch_timeout()
        ));
        let subscriber =
            Subscriber::from_config(&config, drive.clone(), sessions.clone(), reconciler.clone());

        Ok(Self {
            config,
            sessions,
            drive,
            reconciler,
            subscriber
        })
    }

    pub fn webhook_server(&self) -> WebhookServer {
        WebhookServer::new(self.config.clone(), self.reconciler.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_config_starts_without_target() {
        let app = App::from_config(PermWatchConfig::default()).unwrap();
        assert!(app.reconciler.target().await.is_none());
        assert!(app.reconciler.previous_snapshot().await.is_empty());
    }
}

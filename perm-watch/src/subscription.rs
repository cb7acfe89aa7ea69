use crate::auth::SessionProvider;
use crate::config::PermWatchConfig;
use crate::drive::{DriveClient, WatchChannel};
use crate::error::{PermWatchError, PermWatchResult};
use crate::reconcile::{Reconciler, WatchTarget};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Registers notification channels and retargets the reconciler.
pub struct Subscriber {
    drive: Arc<dyn DriveClient>,
    sessions: Arc<dyn SessionProvider>,
    reconciler: Arc<Reconciler>,
    callback_url: Option<String>,
    channel_ttl: Option<Duration>
}

impl Subscriber {
    pub fn new(
        drive: Arc<dyn DriveClient>,
        sessions: Arc<dyn SessionProvider>,
        reconciler: Arc<Reconciler>,
        callback_url: Option<String>
    ) -> Self {
        Self {
            drive,
            sessions,
            reconciler,
            callback_url,
            channel_ttl: None
        }
    }

    pub fn from_config(
        config: &PermWatchConfig,
        drive: Arc<dyn DriveClient>,
        sessions: Arc<dyn SessionProvider>,
        reconciler: Arc<Reconciler>
    ) -> Self {
        Self::new(drive, sessions, reconciler, config.callback_url.clone())
            .with_channel_ttl(config.channel_ttl_seconds.map(Duration::from_secs))
    }

    pub fn with_channel_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.channel_ttl = ttl;
        self
    }

    /// Starts watching `file_id`.
    ///
    /// The id is validated before anything is sent. When the provider rejects
    /// the channel the current target stays in place. On success the previous
    /// channel, if any, is stopped on a best-effort basis.
    pub async fn subscribe(&self, file_id: &str) -> PermWatchResult<WatchTarget> {
        validate_file_id(file_id)?;

        let address = self.callback_url.clone().ok_or_else(|| {
            PermWatchError::ConfigError(
                "callback_url must be set before subscribing to a file".to_string()
            )
        })?;

        let session = self.sessions.session().await?;
        let channel = WatchChannel {
            id: new_channel_id(),
            address,
            expiration: self
                .channel_ttl
                .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
                .map(|ttl| Utc::now() + ttl)
        };

        let registration = self
            .drive
            .watch_file(&session, file_id, &channel)
            .await
            .map_err(|e| match e {
                PermWatchError::AuthFailure(_) | PermWatchError::RegistrationFailure { .. } => e,
                other => PermWatchError::RegistrationFailure {
                    status: other.status(),
                    message: other.to_string()
                }
            })?;

        info!(
            file_id = %file_id,
            channel_id = %registration.channel_id,
            resource_id = %registration.resource_id,
            expiration = ?registration.expiration,
            "Watch established"
        );

        let target = WatchTarget::new(file_id).with_channel(registration);
        let replaced = self.reconciler.retarget(target.clone()).await;

        if let Some(old_channel) = replaced.and_then(|t| t.channel) {
            if let Err(e) = self
                .drive
                .stop_channel(&session, &old_channel.channel_id, &old_channel.resource_id)
                .await
            {
                warn!(
                    channel_id = %old_channel.channel_id,
                    error = %e,
                    "Failed to stop previous channel"
                );
            }
        }

        Ok(target)
    }
}

/// Drive file ids are URL-safe base64-like tokens.
pub fn validate_file_id(file_id: &str) -> PermWatchResult<()> {
    if file_id.trim().is_empty() {
        return Err(PermWatchError::InvalidTarget(
            "file id must not be empty".to_string()
        ));
    }
    if let Some(c) = file_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(PermWatchError::InvalidTarget(format!(
            "file id {:?} contains invalid character {:?}",
            file_id, c
        )));
    }
    Ok(())
}

/// Every registration gets a fresh id; the provider rejects reused ones.
pub fn new_channel_id() -> String {
    format!("permwatch-{}", Uuid::new_v4())
}

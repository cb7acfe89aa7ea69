pub mod auth;
pub mod config;
pub mod drive;
pub mod error;
pub mod reconcile;
pub mod snapshot;
pub mod subscription;
pub mod webhook;

#[cfg(test)]
mod testing;

pub use auth::{InstalledAppFlow, OAuthSessionProvider, Session, SessionProvider};
pub use config::PermWatchConfig;
pub use drive::{DriveClient, GoogleDriveClient};
pub use error::{PermWatchError, PermWatchResult};
pub use reconcile::{CycleResult, LogSink, Reconciler, ReportSink, WatchTarget};
pub use snapshot::{ChangeReport, Identity, Snapshot, diff};
pub use subscription::Subscriber;
pub use webhook::WebhookServer;

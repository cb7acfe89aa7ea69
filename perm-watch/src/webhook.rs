use crate::config::PermWatchConfig;
use crate::error::{PermWatchError, PermWatchResult};
use crate::reconcile::{CycleResult, Reconciler, ReconcilerStatus};
use axum::{
    Router,
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post}
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

pub struct WebhookServer {
    config: PermWatchConfig,
    reconciler: Arc<Reconciler>
}

#[derive(Clone)]
struct AppState {
    reconciler: Arc<Reconciler>
}

pub fn router(reconciler: Arc<Reconciler>) -> Router {
    let state = AppState { reconciler };

    Router::new()
        .route("/updates", post(handle_notification))
        .route("/health", get(health_check))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl WebhookServer {
    pub fn new(config: PermWatchConfig, reconciler: Arc<Reconciler>) -> Self {
        Self { config, reconciler }
    }

    pub async fn run(&self) -> PermWatchResult<()> {
        self.run_until(std::future::pending()).await
    }

    pub async fn run_until<F>(&self, shutdown: F) -> PermWatchResult<()>
    where
        F: Future<Output = ()> + Send + 'static
    {
        let app = router(self.reconciler.clone());

        let addr = self.config.listen_addr();
        info!(addr = %addr, "Starting webhook server");

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| PermWatchError::ConfigError(format!("Failed to bind {}: {}", addr, e)))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| PermWatchError::ConfigError(format!("Server error: {}", e)))?;

        info!("Webhook server stopped");
        Ok(())
    }
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

async fn status(State(state): State<AppState>) -> Json<ReconcilerStatus> {
    Json(state.reconciler.status().await)
}

/// Drive push-notification headers. Notifications carry no body.
#[derive(Debug, Default, PartialEq)]
struct ChannelNotice {
    channel_id: Option<String>,
    resource_id: Option<String>,
    resource_state: Option<String>,
    message_number: Option<u64>
}

impl ChannelNotice {
    fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };

        Self {
            channel_id: header("x-goog-channel-id"),
            resource_id: header("x-goog-resource-id"),
            resource_state: header("x-goog-resource-state"),
            message_number: header("x-goog-message-number").and_then(|s| s.parse().ok())
        }
    }
}

/// Runs one reconciliation cycle and then acknowledges.
///
/// The acknowledgment is `200 OK` even when the cycle failed: the failure is
/// already logged, and an error status would make the provider retry or drop
/// the channel while the next notification retries the fetch anyway.
async fn handle_notification(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    let notice = ChannelNotice::from_headers(&headers);
    debug!(
        channel_id = ?notice.channel_id,
        resource_state = ?notice.resource_state,
        message_number = ?notice.message_number,
        "Received change notification"
    );

    match state.reconciler.on_notification().await {
        CycleResult::Completed { file_id, report } => {
            debug!(file_id = %file_id, changed = report.changed, "Notification handled");
        }
        CycleResult::NoTarget => {
            debug!(channel_id = ?notice.channel_id, "No file is being watched");
        }
        CycleResult::Failed { file_id, error } => {
            warn!(
                file_id = %file_id,
                error = %error,
                "Acknowledging notification after failed cycle"
            );
        }
    }

    StatusCode::OK
}

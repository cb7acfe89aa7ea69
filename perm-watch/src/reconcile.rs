//! Notification-driven reconciliation of the watched file's membership.
//!
//! Every inbound notification only means "something may have changed". A cycle
//! obtains a session, fetches the current snapshot, diffs it against the last
//! committed one, reports the delta and commits. Cycles hold the state lock for
//! their whole duration, so concurrent notifications queue up behind each other
//! and each one diffs against the snapshot committed by its predecessor.

use crate::auth::SessionProvider;
use crate::drive::{ChannelRegistration, DriveClient};
use crate::error::{PermWatchError, PermWatchResult};
use crate::snapshot::{ChangeReport, Identity, Snapshot, diff, fetch_snapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// The file currently subscribed for change notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchTarget {
    pub file_id: String,
    pub channel: Option<ChannelRegistration>,
    pub since: DateTime<Utc>
}

impl WatchTarget {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            channel: None,
            since: Utc::now()
        }
    }

    pub fn with_channel(mut self, channel: ChannelRegistration) -> Self {
        self.channel = Some(channel);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Idle,
    Reconciling
}

#[derive(Debug)]
pub enum CycleResult {
    Completed {
        file_id: String,
        report: ChangeReport
    },
    NoTarget,
    Failed {
        file_id: String,
        error: PermWatchError
    }
}

impl CycleResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    pub fn report(&self) -> Option<&ChangeReport> {
        match self {
            Self::Completed { report, .. } => Some(report),
            _ => None
        }
    }

    pub fn error(&self) -> Option<&PermWatchError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None
        }
    }
}

/// Destination of change reports and cycle failures.
pub trait ReportSink: Send + Sync {
    fn report(&self, file_id: &str, report: &ChangeReport, current: &Snapshot);

    fn failure(&self, file_id: &str, error: &PermWatchError) {
        error!(file_id = %file_id, error = %error, "Reconciliation cycle failed");
    }
}

/// Reports through `tracing`.
pub struct LogSink;

impl ReportSink for LogSink {
    fn report(&self, file_id: &str, report: &ChangeReport, current: &Snapshot) {
        if !report.changed {
            debug!(file_id = %file_id, members = current.len(), "No membership change");
            return;
        }

        for email in &report.added {
            info!(file_id = %file_id, email = %email, "Collaborator added");
        }
        for email in &report.removed {
            info!(file_id = %file_id, email = %email, "Collaborator removed");
        }
        let members: Vec<&str> = current.iter().map(Identity::as_str).collect();
        info!(file_id = %file_id, members = ?members, "Current collaborators");
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcilerStatus {
    pub phase: Option<CyclePhase>,
    pub target: Option<WatchTarget>,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub changes_detected: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_report: Option<ChangeReport>,
    pub last_error: Option<String>
}

#[derive(Default)]
struct ReconcileState {
    target: Option<WatchTarget>,
    previous: Snapshot
}

/// Marks a cycle in flight; cleared on drop so a cancelled cycle does not
/// leave the phase stuck.
struct PhaseGuard<'a>(&'a AtomicBool);

impl<'a> PhaseGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Reconciler {
    drive: Arc<dyn DriveClient>,
    sessions: Arc<dyn SessionProvider>,
    sink: Arc<dyn ReportSink>,
    fetch_timeout: Duration,
    state: Mutex<ReconcileState>,
    status: RwLock<ReconcilerStatus>,
    reconciling: AtomicBool
}

impl Reconciler {
    pub fn new(
        drive: Arc<dyn DriveClient>,
        sessions: Arc<dyn SessionProvider>,
        sink: Arc<dyn ReportSink>,
        fetch_timeout: Duration
    ) -> Self {
        Self {
            drive,
            sessions,
            sink,
            fetch_timeout,
            state: Mutex::new(ReconcileState::default()),
            status: RwLock::new(ReconcilerStatus::default()),
            reconciling: AtomicBool::new(false)
        }
    }

    /// Starts from a known target and baseline instead of an empty state.
    pub fn with_baseline(mut self, target: WatchTarget, previous: Snapshot) -> Self {
        self.status.get_mut().target = Some(target.clone());
        *self.state.get_mut() = ReconcileState {
            target: Some(target),
            previous
        };
        self
    }

    /// Runs one fetch, diff and commit cycle against the current target.
    ///
    /// A cycle that fails leaves the committed snapshot untouched, so the next
    /// notification retries against the last known-good baseline. Status is
    /// recorded before the lock is released, so it follows commit order.
    pub async fn on_notification(&self) -> CycleResult {
        let mut state = self.state.lock().await;

        let Some(file_id) = state.target.as_ref().map(|t| t.file_id.clone()) else {
            debug!("Notification received with no watch target, ignoring");
            return CycleResult::NoTarget;
        };

        let _phase = PhaseGuard::enter(&self.reconciling);

        match self.fetch_current(&file_id).await {
            Ok(current) => {
                let report = diff(&state.previous, &current);
                self.sink.report(&file_id, &report, &current);
                state.previous = current;

                self.record_success(&report).await;
                CycleResult::Completed { file_id, report }
            }
            Err(error) => {
                if error.is_auth_failure() {
                    self.sessions.invalidate().await;
                }
                self.sink.failure(&file_id, &error);
                self.record_failure(&error).await;
                CycleResult::Failed { file_id, error }
            }
        }
    }

    async fn fetch_current(&self, file_id: &str) -> PermWatchResult<Snapshot> {
        let session = self.sessions.session().await.map_err(|e| match e {
            PermWatchError::AuthFailure(_) => e,
            other => PermWatchError::AuthFailure(other.to_string())
        })?;

        match tokio::time::timeout(
            self.fetch_timeout,
            fetch_snapshot(self.drive.as_ref(), &session, file_id)
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PermWatchError::RemoteQueryFailure {
                status: None,
                message: format!(
                    "permission fetch timed out after {}s",
                    self.fetch_timeout.as_secs_f64()
                )
            })
        }
    }

    /// Points future cycles at `target`.
    ///
    /// Switching to a different file clears the baseline, so the next cycle
    /// reports every current collaborator of the new file as added. Re-watching
    /// the same file keeps the baseline. Returns the replaced target.
    pub async fn retarget(&self, target: WatchTarget) -> Option<WatchTarget> {
        let mut state = self.state.lock().await;

        let same_file = state
            .target
            .as_ref()
            .is_some_and(|t| t.file_id == target.file_id);
        if !same_file {
            state.previous = Snapshot::new();
        }

        info!(
            file_id = %target.file_id,
            baseline_reset = !same_file,
            "Watch target updated"
        );

        self.status.write().await.target = Some(target.clone());
        state.target.replace(target)
    }

    pub async fn target(&self) -> Option<WatchTarget> {
        self.state.lock().await.target.clone()
    }

    /// Last committed snapshot. Waits for any in-flight cycle.
    pub async fn previous_snapshot(&self) -> Snapshot {
        self.state.lock().await.previous.clone()
    }

    pub fn phase(&self) -> CyclePhase {
        if self.reconciling.load(Ordering::SeqCst) {
            CyclePhase::Reconciling
        } else {
            CyclePhase::Idle
        }
    }

    /// Counters and last outcome; never waits on an in-flight cycle.
    pub async fn status(&self) -> ReconcilerStatus {
        let mut status = self.status.read().await.clone();
        status.phase = Some(self.phase());
        status
    }

    async fn record_success(&self, report: &ChangeReport) {
        let mut status = self.status.write().await;
        status.cycles_completed += 1;
        if report.changed {
            status.changes_detected += 1;
        }
        status.last_cycle_at = Some(Utc::now());
        status.last_report = Some(report.clone());
        status.last_error = None;
    }

    async fn record_failure(&self, error: &PermWatchError) {
        if error.is_retryable() {
            warn!(error = %error, "Cycle failed, next notification will retry");
        }
        let mut status = self.status.write().await;
        status.cycles_failed += 1;
        status.last_cycle_at = Some(Utc::now());
        status.last_error = Some(error.to_string());
    }
}

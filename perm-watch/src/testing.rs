//! In-memory collaborators shared by the unit tests.

use crate::auth::{Session, SessionProvider};
use crate::drive::{
    ChannelRegistration, DriveClient, DriveFile, Permission, PermissionPage, WatchChannel
};
use crate::error::{PermWatchError, PermWatchResult};
use crate::reconcile::ReportSink;
use crate::snapshot::{ChangeReport, Snapshot};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub struct StaticSessions;

#[async_trait]
impl SessionProvider for StaticSessions {
    async fn session(&self) -> PermWatchResult<Session> {
        Ok(Session::new("test-token"))
    }
}

pub struct FailingSessions;

#[async_trait]
impl SessionProvider for FailingSessions {
    async fn session(&self) -> PermWatchResult<Session> {
        Err(PermWatchError::AuthFailure("refresh token revoked".to_string()))
    }
}

/// Drive double answering permission listings from a script.
pub struct ScriptedDrive {
    script: Mutex<VecDeque<PermWatchResult<Vec<&'static str>>>>,
    fallback: Option<Vec<&'static str>>,
    delay: Duration,
    reject_watch: bool,
    calls: AtomicUsize,
    watched: Mutex<Vec<(String, WatchChannel)>>,
    stopped: Mutex<Vec<String>>
}

impl ScriptedDrive {
    pub fn new(script: Vec<PermWatchResult<Vec<&'static str>>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            delay: Duration::ZERO,
            reject_watch: false,
            calls: AtomicUsize::new(0),
            watched: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new())
        }
    }

    /// Always answers with the same membership.
    pub fn repeating(emails: Vec<&'static str>) -> Self {
        let mut drive = Self::new(Vec::new());
        drive.fallback = Some(emails);
        drive
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn rejecting_watches(mut self) -> Self {
        self.reject_watch = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn watched(&self) -> Vec<(String, WatchChannel)> {
        self.watched.lock().unwrap().clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().unwrap().clone()
    }
}

#[async_trait]
impl DriveClient for ScriptedDrive {
    async fn list_files(&self, _session: &Session, _count: u32) -> PermWatchResult<Vec<DriveFile>> {
        Ok(Vec::new())
    }

    async fn download_file(
        &self,
        _session: &Session,
        _file_id: &str,
        _dest: &Path
    ) -> PermWatchResult<u64> {
        Ok(0)
    }

    async fn list_permissions(
        &self,
        _session: &Session,
        _file_id: &str,
        _page_token: Option<&str>
    ) -> PermWatchResult<PermissionPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        let emails = match next {
            Some(result) => result?,
            None => self.fallback.clone().ok_or_else(|| {
                PermWatchError::RemoteQueryFailure {
                    status: None,
                    message: "script exhausted".to_string()
                }
            })?
        };

        Ok(PermissionPage {
            permissions: emails
                .into_iter()
                .enumerate()
                .map(|(i, email)| Permission {
                    id: i.to_string(),
                    email_address: Some(email.to_string()),
                    role: Some("writer".to_string()),
                    permission_type: Some("user".to_string())
                })
                .collect(),
            next_page_token: None
        })
    }

    async fn watch_file(
        &self,
        _session: &Session,
        file_id: &str,
        channel: &WatchChannel
    ) -> PermWatchResult<ChannelRegistration> {
        if self.reject_watch {
            return Err(PermWatchError::RegistrationFailure {
                status: Some(400),
                message: format!("Channel id {} not unique", channel.id)
            });
        }

        self.watched
            .lock()
            .unwrap()
            .push((file_id.to_string(), channel.clone()));
        Ok(ChannelRegistration {
            channel_id: channel.id.clone(),
            resource_id: format!("res-{}", file_id),
            resource_uri: None,
            expiration: channel.expiration
        })
    }

    async fn stop_channel(
        &self,
        _session: &Session,
        channel_id: &str,
        _resource_id: &str
    ) -> PermWatchResult<()> {
        self.stopped.lock().unwrap().push(channel_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<(String, ChangeReport)>>,
    failures: AtomicUsize
}

impl RecordingSink {
    pub fn reports(&self) -> Vec<(String, ChangeReport)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

impl ReportSink for RecordingSink {
    fn report(&self, file_id: &str, report: &ChangeReport, _current: &Snapshot) {
        self.reports
            .lock()
            .unwrap()
            .push((file_id.to_string(), report.clone()));
    }

    fn failure(&self, _file_id: &str, _error: &PermWatchError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
}

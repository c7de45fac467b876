//! Shared test doubles for integration tests.
//!
//! Provides a scripted Argo CD API, a recording metrics sink and a recording
//! notification strategy.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rollout_watcher::argo::{Application, ArgoApi, ArgoApiError, UserInfo};
use rollout_watcher::infrastructure::metrics::MetricsSink;
use rollout_watcher::notify::{NotificationStrategy, NotifyError};
use rollout_watcher::task::{Task, TaskStatus};

/// Builds an application snapshot.
pub fn application(images: &[&str], sync: &str, health: &str) -> Application {
    let mut app = Application::default();
    app.metadata.name = "demo".to_string();
    app.status.summary.images = images.iter().map(ToString::to_string).collect();
    app.status.sync.status = sync.to_string();
    app.status.health.status = health.to_string();
    app
}

/// Argo CD API answering from a script.
///
/// Each `get_application` call pops the next scripted answer; the last one is
/// repeated once the script is exhausted.
pub struct ScriptedArgo {
    script: Mutex<VecDeque<Result<Application, ArgoApiError>>>,
    user_info: Mutex<Result<UserInfo, ArgoApiError>>,
    calls: AtomicUsize,
}

impl ScriptedArgo {
    pub fn new(script: Vec<Result<Application, ArgoApiError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            user_info: Mutex::new(Ok(UserInfo {
                logged_in: true,
                username: "watcher".to_string(),
            })),
            calls: AtomicUsize::new(0),
        })
    }

    /// Healthy session, no application script.
    pub fn logged_in() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn set_user_info(&self, answer: Result<UserInfo, ArgoApiError>) {
        *self.user_info.lock() = answer;
    }

    /// Number of `get_application` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArgoApi for ScriptedArgo {
    async fn get_application(&self, name: &str) -> Result<Application, ArgoApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock();
        let answer = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        answer.unwrap_or_else(|| Err(ArgoApiError::NotFound(name.to_string())))
    }

    async fn get_user_info(&self) -> Result<UserInfo, ArgoApiError> {
        self.user_info.lock().clone()
    }
}

/// Metrics sink keeping every value in memory.
#[derive(Default)]
pub struct RecordingMetrics {
    pub processed: Mutex<HashMap<String, u64>>,
    pub failed: Mutex<HashMap<String, u64>>,
    pub argo_unavailable: AtomicBool,
    pub in_progress: AtomicI64,
    pub max_in_progress: AtomicI64,
}

impl RecordingMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn processed(&self, app: &str) -> u64 {
        self.processed.lock().get(app).copied().unwrap_or_default()
    }

    pub fn failed(&self, app: &str) -> u64 {
        self.failed.lock().get(app).copied().unwrap_or_default()
    }

    pub fn in_progress(&self) -> i64 {
        self.in_progress.load(Ordering::SeqCst)
    }
}

impl MetricsSink for RecordingMetrics {
    fn add_processed_deployment(&self, app: &str) {
        *self.processed.lock().entry(app.to_string()).or_default() += 1;
    }

    fn add_failed_deployment(&self, app: &str) {
        *self.failed.lock().entry(app.to_string()).or_default() += 1;
    }

    fn reset_failed_deployment(&self, app: &str) {
        self.failed.lock().insert(app.to_string(), 0);
    }

    fn set_argo_unavailable(&self, unavailable: bool) {
        self.argo_unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn add_in_progress_task(&self) {
        let now = self.in_progress.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_progress.fetch_max(now, Ordering::SeqCst);
    }

    fn remove_in_progress_task(&self) {
        self.in_progress.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Notification strategy remembering the status of every delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    pub seen: Mutex<Vec<TaskStatus>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn seen(&self) -> Vec<TaskStatus> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl NotificationStrategy for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, task: &Task) -> Result<(), NotifyError> {
        self.seen.lock().push(task.status);
        if self.fail {
            Err(NotifyError::UnexpectedStatus(500))
        } else {
            Ok(())
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::Lifecycle;
use super::ManagerState;
use super::NotificationDispatcher;
use super::ReshardingWatcher;
use crate::CoordinationClient;
use crate::DispatcherConfig;
use crate::JobKind;
use crate::JobResolver;
use crate::Settings;

/// Start/stop surface the scheduler drives for every listener of a job.
pub trait ListenerManager: Send + Sync {
    fn start(&self);

    /// Idempotent, safe before `start()`.
    fn shutdown(&self);
}

struct Machinery {
    lifecycle: Arc<Lifecycle>,
    watcher: Arc<ReshardingWatcher>,
    dispatcher: Arc<NotificationDispatcher>,
}

/// Tells a running job that its shards were reassigned.
///
/// Watches the job's sharding node and calls
/// [`ReshardingJob::on_resharding`](crate::ReshardingJob::on_resharding) on a
/// dedicated worker thread each time the node is created or its data changes.
///
/// Cron jobs ignore reassignment, so for [`JobKind::Cron`] nothing is built:
/// no watch, no worker, and `start()`/`shutdown()` do nothing.
///
/// # Example
/// ```ignore
/// let manager = ReshardingListenerManager::new("orders", JobKind::Standard, client, slot, &settings);
/// manager.start();
/// // ...
/// manager.shutdown();
/// ```
pub struct ReshardingListenerManager {
    job_name: String,
    kind: JobKind,
    path: String,
    machinery: Option<Machinery>,
}

impl std::fmt::Debug for ReshardingListenerManager {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ReshardingListenerManager")
            .field("job_name", &self.job_name)
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("state", &self.state())
            .finish()
    }
}

impl ReshardingListenerManager {
    /// Builds a manager watching the node `settings.watcher` resolves for `job_name`.
    pub fn new(
        job_name: impl Into<String>,
        kind: JobKind,
        client: Arc<dyn CoordinationClient>,
        resolver: Arc<dyn JobResolver>,
        settings: &Settings,
    ) -> Self {
        let job_name = job_name.into();
        let path = settings.watcher.node_path(&job_name);
        Self::with_path(job_name, kind, path, client, resolver, &settings.dispatcher)
    }

    /// Builds a manager watching an explicit node path.
    pub fn with_path(
        job_name: impl Into<String>,
        kind: JobKind,
        path: impl Into<String>,
        client: Arc<dyn CoordinationClient>,
        resolver: Arc<dyn JobResolver>,
        dispatcher_config: &DispatcherConfig,
    ) -> Self {
        let job_name = job_name.into();
        let path = path.into();

        let machinery = if kind.needs_resharding_notifications() {
            let lifecycle = Arc::new(Lifecycle::new());
            let dispatcher = Arc::new(NotificationDispatcher::new(
                &job_name,
                dispatcher_config,
                lifecycle.clone(),
                resolver,
            ));
            let watcher =
                ReshardingWatcher::new(&job_name, &path, client, dispatcher.clone(), lifecycle.clone());
            Some(Machinery {
                lifecycle,
                watcher,
                dispatcher,
            })
        } else {
            debug!(job = %job_name, "Cron job, resharding watch not needed");
            None
        };

        Self {
            job_name,
            kind,
            path,
            machinery,
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// The watched sharding node
    pub fn path(&self) -> &str {
        &self.path
    }

    /// False for cron jobs
    pub fn is_watching_enabled(&self) -> bool {
        self.machinery.is_some()
    }

    /// `None` when watching is disabled for this job kind.
    pub fn state(&self) -> Option<ManagerState> {
        self.machinery.as_ref().map(|m| m.lifecycle.state())
    }

    pub fn is_watch_armed(&self) -> bool {
        self.machinery
            .as_ref()
            .map(|m| m.watcher.is_armed())
            .unwrap_or(false)
    }

    /// Whether the worker thread is alive.
    pub fn is_worker_running(&self) -> bool {
        self.machinery
            .as_ref()
            .map(|m| m.dispatcher.is_running())
            .unwrap_or(false)
    }

    /// Waits up to `timeout` for the worker thread to exit after `shutdown()`.
    ///
    /// A callback that was already running when shutdown began keeps the
    /// worker alive until it returns.
    pub fn await_termination(
        &self,
        timeout: Duration,
    ) -> bool {
        self.machinery
            .as_ref()
            .map(|m| m.dispatcher.await_termination(timeout))
            .unwrap_or(true)
    }
}

impl ListenerManager for ReshardingListenerManager {
    fn start(&self) {
        let Some(machinery) = &self.machinery else {
            return;
        };

        if !machinery.lifecycle.activate() {
            warn!(
                job = %self.job_name,
                state = ?machinery.lifecycle.state(),
                "Resharding listener already started or shut down, start ignored"
            );
            return;
        }

        if let Err(e) = machinery.dispatcher.start() {
            error!(job = %self.job_name, "Failed to start resharding notification worker: {}", e);
            machinery.dispatcher.stop();
        }

        if !machinery.watcher.arm() {
            warn!(
                job = %self.job_name,
                path = %self.path,
                "Resharding watch not armed, changes stay invisible until it is registered"
            );
        }

        info!(job = %self.job_name, path = %self.path, "Resharding listener started");
    }

    fn shutdown(&self) {
        let Some(machinery) = &self.machinery else {
            return;
        };

        if let Err(state) = machinery.lifecycle.begin_shutdown() {
            debug!(job = %self.job_name, ?state, "Resharding listener already shut down");
            return;
        }

        machinery.watcher.disarm();
        machinery.dispatcher.stop();
        machinery.lifecycle.finish_shutdown();

        info!(job = %self.job_name, "Resharding listener shut down");
    }
}

impl Drop for ReshardingListenerManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use super::dispatcher::panic_message;
use super::Lifecycle;
use super::NotificationDispatcher;
use super::PendingNotification;
use crate::metrics;
use crate::CoordinationClient;
use crate::DispatchError;
use crate::Error;
use crate::NodeEvent;
use crate::NodeWatcher;

/// One-shot watch on the sharding node that renews itself on every delivery.
///
/// Runs on the coordination client's delivery thread: it re-registers the
/// watch first, then hands relevant events to the dispatcher and returns.
pub struct ReshardingWatcher {
    job_name: String,
    path: String,
    client: Arc<dyn CoordinationClient>,
    dispatcher: Arc<NotificationDispatcher>,
    lifecycle: Arc<Lifecycle>,
    armed: AtomicBool,
    this: Weak<ReshardingWatcher>,
}

impl std::fmt::Debug for ReshardingWatcher {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ReshardingWatcher")
            .field("job_name", &self.job_name)
            .field("path", &self.path)
            .field("armed", &self.armed)
            .finish_non_exhaustive()
    }
}

impl ReshardingWatcher {
    pub(crate) fn new(
        job_name: &str,
        path: &str,
        client: Arc<dyn CoordinationClient>,
        dispatcher: Arc<NotificationDispatcher>,
        lifecycle: Arc<Lifecycle>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            job_name: job_name.to_string(),
            path: path.to_string(),
            client,
            dispatcher,
            lifecycle,
            armed: AtomicBool::new(false),
            this: this.clone(),
        })
    }

    /// Registers the watch. Failures are logged and counted, not retried.
    pub(crate) fn arm(&self) -> bool {
        let Some(this) = self.this.upgrade() else {
            return false;
        };

        metrics::record_rearm(&self.job_name);
        match self.client.register_watch(&self.path, this) {
            Ok(()) => {
                self.armed.store(true, Ordering::SeqCst);
                trace!(job = %self.job_name, path = %self.path, "Resharding watch armed");
                true
            }
            Err(e) => {
                warn!(
                    job = %self.job_name,
                    path = %self.path,
                    "Failed to register resharding watch: {}",
                    e
                );
                metrics::record_rearm_failure(&self.job_name, e.kind());
                false
            }
        }
    }

    /// Marks the watch as no longer owned. A watch still registered with the
    /// service will be ignored when it fires.
    pub(crate) fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn handle(
        &self,
        event: NodeEvent,
    ) {
        // The registration that delivered this event is consumed
        self.armed.store(false, Ordering::SeqCst);

        if !self.lifecycle.is_active() {
            debug!(
                job = %self.job_name,
                event_type = %event.event_type,
                path = %event.path,
                state = ?self.lifecycle.state(),
                "Listener not active, ignoring watch event"
            );
            return;
        }

        self.arm();

        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| self.classify_and_submit(&event))) {
            error!(
                job = %self.job_name,
                event_type = %event.event_type,
                path = %event.path,
                "Resharding watch handler panicked: {}",
                panic_message(panic.as_ref())
            );
        }
    }

    fn classify_and_submit(
        &self,
        event: &NodeEvent,
    ) {
        if !event.event_type.is_resharding_trigger() {
            trace!(
                job = %self.job_name,
                event_type = %event.event_type,
                path = %event.path,
                "Event does not trigger resharding"
            );
            return;
        }

        let notification = PendingNotification::from_event(event);
        let id = notification.id.clone();
        match self.dispatcher.submit(notification) {
            Ok(()) => {
                debug!(job = %self.job_name, %id, event_type = %event.event_type, "Resharding notification queued");
            }
            Err(Error::Dispatch(DispatchError::Stopped)) => {
                debug!(job = %self.job_name, %id, "Dispatcher stopped, notification ignored");
            }
            Err(e) => {
                warn!(
                    job = %self.job_name,
                    %id,
                    event_type = %event.event_type,
                    path = %event.path,
                    "Failed to queue resharding notification: {}",
                    e
                );
            }
        }
    }
}

impl NodeWatcher for ReshardingWatcher {
    fn process(
        &self,
        event: NodeEvent,
    ) {
        self.handle(event);
    }
}

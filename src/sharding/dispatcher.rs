//! Single-worker notification dispatcher.
//!
//! ```text
//! Delivery thread (shared, must not block):
//!   ReshardingWatcher::process() -> submit() -> try_send(queue)   [non-blocking]
//!                                                   ↓
//! Dedicated worker thread (one per manager):
//!   queue.recv() -> lifecycle check -> resolve job -> on_resharding()
//! ```
//!
//! Notifications run strictly FIFO, one at a time. A slow callback only delays
//! this manager's later notifications.

use std::any::Any;
use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use crossbeam_channel::bounded;
use crossbeam_channel::unbounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::RecvTimeoutError;
use crossbeam_channel::Sender;
use crossbeam_channel::TrySendError;
use parking_lot::Mutex;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::Lifecycle;
use super::PendingNotification;
use crate::constants::DROP_REASON_DISCARDED;
use crate::constants::DROP_REASON_INACTIVE;
use crate::constants::DROP_REASON_JOB_GONE;
use crate::constants::DROP_REASON_QUEUE_FULL;
use crate::constants::DROP_REASON_STOPPED;
use crate::constants::OUTCOME_ERROR;
use crate::constants::OUTCOME_OK;
use crate::constants::OUTCOME_PANIC;
use crate::metrics;
use crate::DispatchError;
use crate::DispatcherConfig;
use crate::JobResolver;
use crate::Result;

/// What the worker thread needs, moved into it on start
struct Worker {
    job_name: String,
    lifecycle: Arc<Lifecycle>,
    resolver: Arc<dyn JobResolver>,
    /// Disconnects the termination receiver when the worker exits
    _terminated: Sender<()>,
}

impl Worker {
    fn run(
        self,
        queue_rx: Receiver<PendingNotification>,
        shutdown_rx: Receiver<()>,
    ) {
        debug!(job = %self.job_name, "Resharding notification worker started");

        loop {
            crossbeam_channel::select! {
                recv(shutdown_rx) -> _ => {
                    debug!(job = %self.job_name, "Notification worker received shutdown signal");
                    break;
                }
                recv(queue_rx) -> result => {
                    match result {
                        Ok(notification) => {
                            if !self.execute(notification) {
                                break;
                            }
                        }
                        Err(_) => {
                            warn!(job = %self.job_name, "Notification queue closed unexpectedly");
                            break;
                        }
                    }
                }
            }
        }

        let discarded = queue_rx.try_iter().count();
        if discarded > 0 {
            debug!(job = %self.job_name, discarded, "Discarded queued notifications on stop");
            metrics::record_dropped(&self.job_name, DROP_REASON_DISCARDED, discarded as u64);
        }

        debug!(job = %self.job_name, "Resharding notification worker stopped");
    }

    /// Runs one notification. Returns false when the worker must stop.
    fn execute(
        &self,
        notification: PendingNotification,
    ) -> bool {
        if !self.lifecycle.is_active() {
            trace!(job = %self.job_name, id = %notification.id, "Listener inactive, dropping notification");
            metrics::record_dropped(&self.job_name, DROP_REASON_INACTIVE, 1);
            return false;
        }

        let Some(job) = self.resolver.resolve_current_job() else {
            trace!(job = %self.job_name, id = %notification.id, "Job gone, dropping notification");
            metrics::record_dropped(&self.job_name, DROP_REASON_JOB_GONE, 1);
            return true;
        };

        // Resolution may have raced with shutdown
        if !self.lifecycle.is_active() {
            metrics::record_dropped(&self.job_name, DROP_REASON_INACTIVE, 1);
            return false;
        }

        info!(
            job = %self.job_name,
            id = %notification.id,
            event_type = %notification.event_type,
            path = %notification.path,
            queued_ms = notification.age().as_millis() as u64,
            "trigger on-resharding event"
        );

        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| job.on_resharding()));
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let label = match outcome {
            Ok(Ok(())) => OUTCOME_OK,
            Ok(Err(e)) => {
                error!(
                    job = %self.job_name,
                    id = %notification.id,
                    event_type = %notification.event_type,
                    path = %notification.path,
                    "on-resharding callback failed: {}",
                    e
                );
                OUTCOME_ERROR
            }
            Err(panic) => {
                error!(
                    job = %self.job_name,
                    id = %notification.id,
                    event_type = %notification.event_type,
                    path = %notification.path,
                    "on-resharding callback panicked: {}",
                    panic_message(panic.as_ref())
                );
                OUTCOME_PANIC
            }
        };
        metrics::record_callback(&self.job_name, label, duration_ms);

        true
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}

/// Executes resharding callbacks off the delivery thread.
pub struct NotificationDispatcher {
    job_name: String,
    thread_name: String,
    capacity: Option<usize>,

    queue_tx: Sender<PendingNotification>,
    /// Moved into the worker on start
    queue_rx: Mutex<Option<Receiver<PendingNotification>>>,

    /// Dropping the sender stops the worker
    shutdown_tx: Mutex<Option<Sender<()>>>,

    worker_handle: Mutex<Option<JoinHandle<()>>>,

    /// Disconnected once the worker thread has exited
    terminated_rx: Mutex<Option<Receiver<()>>>,

    stopped: AtomicBool,

    lifecycle: Arc<Lifecycle>,
    resolver: Arc<dyn JobResolver>,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("job_name", &self.job_name)
            .field("thread_name", &self.thread_name)
            .field("capacity", &self.capacity)
            .field("pending", &self.queue_tx.len())
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    pub(crate) fn new(
        job_name: &str,
        config: &DispatcherConfig,
        lifecycle: Arc<Lifecycle>,
        resolver: Arc<dyn JobResolver>,
    ) -> Self {
        let (queue_tx, queue_rx) = if config.is_bounded() {
            bounded(config.queue_capacity)
        } else {
            unbounded()
        };

        Self {
            job_name: job_name.to_string(),
            thread_name: config.thread_name(job_name),
            capacity: config.is_bounded().then_some(config.queue_capacity),
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
            shutdown_tx: Mutex::new(None),
            worker_handle: Mutex::new(None),
            terminated_rx: Mutex::new(None),
            stopped: AtomicBool::new(false),
            lifecycle,
            resolver,
        }
    }

    /// Spawns the worker thread. Calling it again is a no-op.
    pub(crate) fn start(&self) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(DispatchError::Stopped.into());
        }

        let mut handle_guard = self.worker_handle.lock();
        if handle_guard.is_some() {
            return Ok(());
        }

        let Some(queue_rx) = self.queue_rx.lock().take() else {
            return Err(DispatchError::Stopped.into());
        };

        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let (terminated_tx, terminated_rx) = bounded::<()>(1);
        let worker = Worker {
            job_name: self.job_name.clone(),
            lifecycle: self.lifecycle.clone(),
            resolver: self.resolver.clone(),
            _terminated: terminated_tx,
        };

        let handle = std::thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || worker.run(queue_rx, shutdown_rx))
            .map_err(|e| DispatchError::WorkerSpawn(e.to_string()))?;

        *handle_guard = Some(handle);
        *self.shutdown_tx.lock() = Some(shutdown_tx);
        *self.terminated_rx.lock() = Some(terminated_rx);
        Ok(())
    }

    /// Queues a notification without blocking.
    ///
    /// After `stop()` this is a no-op returning `DispatchError::Stopped`.
    pub fn submit(
        &self,
        notification: PendingNotification,
    ) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            metrics::record_dropped(&self.job_name, DROP_REASON_STOPPED, 1);
            return Err(DispatchError::Stopped.into());
        }

        match self.queue_tx.try_send(notification) {
            Ok(()) => {
                metrics::record_enqueued(&self.job_name);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                metrics::record_dropped(&self.job_name, DROP_REASON_QUEUE_FULL, 1);
                Err(DispatchError::QueueFull {
                    capacity: self.capacity.unwrap_or_default(),
                }
                .into())
            }
            Err(TrySendError::Disconnected(_)) => {
                metrics::record_dropped(&self.job_name, DROP_REASON_STOPPED, 1);
                Err(DispatchError::Stopped.into())
            }
        }
    }

    /// Signals the worker to stop without waiting for it.
    ///
    /// Queued notifications are discarded. A callback already running is
    /// left to finish. Idempotent.
    pub(crate) fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        drop(self.shutdown_tx.lock().take());

        // Never started: nothing owns the queue but us
        if let Some(queue_rx) = self.queue_rx.lock().take() {
            let discarded = queue_rx.try_iter().count();
            if discarded > 0 {
                metrics::record_dropped(&self.job_name, DROP_REASON_DISCARDED, discarded as u64);
            }
        }
    }

    /// Waits up to `timeout` for the worker thread to exit.
    ///
    /// Returns true if the worker has exited or was never started.
    pub fn await_termination(
        &self,
        timeout: Duration,
    ) -> bool {
        let guard = self.terminated_rx.lock();
        let Some(terminated_rx) = guard.as_ref() else {
            return true;
        };

        match terminated_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => false,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.worker_handle
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Notifications queued and not yet picked up by the worker
    pub fn pending(&self) -> usize {
        self.queue_tx.len()
    }
}

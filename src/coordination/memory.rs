use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::unbounded;
use crossbeam_channel::Sender;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use super::CoordinationClient;
use super::NodeEvent;
use super::NodeEventType;
use super::NodeWatcher;
use crate::constants::DELIVERY_THREAD_NAME;
use crate::CoordinationError;
use crate::Result;

enum Delivery {
    Event {
        watcher: Arc<dyn NodeWatcher>,
        event: NodeEvent,
    },
    /// Acknowledged once every delivery queued before it has been processed
    Barrier(Sender<()>),
}

struct CoordinatorInner {
    nodes: DashMap<String, Vec<u8>>,

    /// Pending one-shot watches per path
    watches: DashMap<String, Vec<Arc<dyn NodeWatcher>>>,

    registrations: AtomicU64,

    /// Remaining registrations to reject with `ConnectionLoss`
    injected_failures: AtomicUsize,

    closed: AtomicBool,
}

/// In-process coordination service with one-shot watches.
///
/// Watches are consumed when they fire and delivered, in order, on a single
/// delivery thread shared by every watcher, the way a real client's event
/// thread behaves. A panicking watcher is logged and does not stop delivery.
pub struct InMemoryCoordinator {
    inner: Arc<CoordinatorInner>,

    /// Serializes mutations so events are queued in mutation order
    write_lock: Mutex<()>,

    event_tx: Mutex<Option<Sender<Delivery>>>,

    delivery_thread: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for InMemoryCoordinator {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("InMemoryCoordinator")
            .field("nodes", &self.inner.nodes.len())
            .field("watched_paths", &self.inner.watches.len())
            .field("registrations", &self.inner.registrations)
            .field("closed", &self.inner.closed)
            .finish_non_exhaustive()
    }
}

impl InMemoryCoordinator {
    /// Creates the coordinator and starts its delivery thread.
    pub fn new() -> Result<Self> {
        let (event_tx, event_rx) = unbounded::<Delivery>();

        let handle = std::thread::Builder::new()
            .name(DELIVERY_THREAD_NAME.to_string())
            .spawn(move || {
                debug!("Coordination delivery thread started");

                for delivery in event_rx.iter() {
                    match delivery {
                        Delivery::Event { watcher, event } => {
                            let path = event.path.clone();
                            let event_type = event.event_type;
                            if catch_unwind(AssertUnwindSafe(|| watcher.process(event))).is_err() {
                                error!(%path, %event_type, "Watcher panicked while processing event");
                            }
                        }
                        Delivery::Barrier(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }

                debug!("Coordination delivery thread stopped");
            })
            .map_err(|e| {
                error!("Failed to spawn delivery thread: {}", e);
                CoordinationError::Closed
            })?;

        Ok(Self {
            inner: Arc::new(CoordinatorInner {
                nodes: DashMap::new(),
                watches: DashMap::new(),
                registrations: AtomicU64::new(0),
                injected_failures: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
            write_lock: Mutex::new(()),
            event_tx: Mutex::new(Some(event_tx)),
            delivery_thread: Mutex::new(Some(handle)),
        })
    }

    pub fn create(
        &self,
        path: &str,
        data: impl Into<Vec<u8>>,
    ) -> Result<()> {
        self.ensure_open()?;
        let _guard = self.write_lock.lock();

        if self.inner.nodes.contains_key(path) {
            return Err(CoordinationError::NodeExists(path.to_string()).into());
        }
        self.inner.nodes.insert(path.to_string(), data.into());
        self.trigger(NodeEvent::new(NodeEventType::Created, path));
        Ok(())
    }

    pub fn set_data(
        &self,
        path: &str,
        data: impl Into<Vec<u8>>,
    ) -> Result<()> {
        self.ensure_open()?;
        let _guard = self.write_lock.lock();

        match self.inner.nodes.get_mut(path) {
            Some(mut node) => *node = data.into(),
            None => return Err(CoordinationError::NoNode(path.to_string()).into()),
        }
        self.trigger(NodeEvent::new(NodeEventType::DataChanged, path));
        Ok(())
    }

    pub fn delete(
        &self,
        path: &str,
    ) -> Result<()> {
        self.ensure_open()?;
        let _guard = self.write_lock.lock();

        if self.inner.nodes.remove(path).is_none() {
            return Err(CoordinationError::NoNode(path.to_string()).into());
        }
        self.trigger(NodeEvent::new(NodeEventType::Deleted, path));
        Ok(())
    }

    pub fn get_data(
        &self,
        path: &str,
    ) -> Option<Vec<u8>> {
        self.inner.nodes.get(path).map(|node| node.clone())
    }

    pub fn exists(
        &self,
        path: &str,
    ) -> bool {
        self.inner.nodes.contains_key(path)
    }

    /// Fires the watches on `event.path` with an arbitrary event, without
    /// touching node data. Used for event types no mutation produces.
    pub fn fire(
        &self,
        event: NodeEvent,
    ) -> Result<()> {
        self.ensure_open()?;
        let _guard = self.write_lock.lock();
        self.trigger(event);
        Ok(())
    }

    /// Number of `register_watch` calls accepted so far
    pub fn registration_count(&self) -> u64 {
        self.inner.registrations.load(Ordering::SeqCst)
    }

    /// Number of watches waiting to fire on `path`
    pub fn pending_watch_count(
        &self,
        path: &str,
    ) -> usize {
        self.inner.watches.get(path).map(|w| w.len()).unwrap_or(0)
    }

    /// Rejects the next `count` registrations with `ConnectionLoss`.
    pub fn inject_registration_failures(
        &self,
        count: usize,
    ) {
        self.inner.injected_failures.store(count, Ordering::SeqCst);
    }

    /// Blocks until every event queued so far has been delivered.
    ///
    /// Returns false on timeout or when the coordinator is closed.
    pub fn sync(
        &self,
        timeout: Duration,
    ) -> bool {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        let sent = match self.event_tx.lock().as_ref() {
            Some(tx) => tx.send(Delivery::Barrier(ack_tx)).is_ok(),
            None => false,
        };
        sent && ack_rx.recv_timeout(timeout).is_ok()
    }

    /// Drops pending watches and stops the delivery thread after it has
    /// delivered what was already queued. Idempotent.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.watches.clear();

        // Dropping the sender ends the delivery loop
        drop(self.event_tx.lock().take());

        if let Some(handle) = self.delivery_thread.lock().take() {
            if handle.thread().id() == std::thread::current().id() {
                warn!("close() called from the delivery thread, not joining");
                return;
            }
            let _ = handle.join();
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(CoordinationError::Closed.into());
        }
        Ok(())
    }

    /// Consumes the watches on the event path and queues their deliveries.
    fn trigger(
        &self,
        event: NodeEvent,
    ) {
        let Some((_, watchers)) = self.inner.watches.remove(&event.path) else {
            trace!(path = %event.path, event_type = %event.event_type, "No watch to fire");
            return;
        };

        let guard = self.event_tx.lock();
        let Some(tx) = guard.as_ref() else {
            return;
        };
        for watcher in watchers {
            let _ = tx.send(Delivery::Event {
                watcher,
                event: event.clone(),
            });
        }
    }
}

impl CoordinationClient for InMemoryCoordinator {
    fn register_watch(
        &self,
        path: &str,
        watcher: Arc<dyn NodeWatcher>,
    ) -> Result<()> {
        self.ensure_open()?;

        let injected = self
            .inner
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(CoordinationError::ConnectionLoss(path.to_string()).into());
        }

        self.inner.registrations.fetch_add(1, Ordering::SeqCst);

        let mut watchers = self.inner.watches.entry(path.to_string()).or_default();
        let already_registered = watchers
            .iter()
            .any(|w| Arc::as_ptr(w) as *const () == Arc::as_ptr(&watcher) as *const ());
        if !already_registered {
            watchers.push(watcher);
        }

        trace!(%path, deduplicated = already_registered, "Watch registered");
        Ok(())
    }
}

impl Drop for InMemoryCoordinator {
    fn drop(&mut self) {
        self.close();
    }
}

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Mutex;
use reshard_notify::InMemoryCoordinator;
use reshard_notify::JobKind;
use reshard_notify::JobSlot;
use reshard_notify::ReshardingJob;
use reshard_notify::ReshardingListenerManager;
use reshard_notify::Result;
use reshard_notify::Settings;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(3);

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = env_logger::builder().is_test(true).try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
}

pub fn wait_until(
    timeout: Duration,
    mut condition: impl FnMut() -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Records the order callbacks ran in, tagged by job instance.
pub struct TaggedJob {
    tag: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
}

impl TaggedJob {
    pub fn new(
        tag: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        delay: Duration,
    ) -> Self {
        Self {
            tag,
            log,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ReshardingJob for TaggedJob {
    fn on_resharding(&self) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.log.lock().push(self.tag);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Harness {
    pub coordinator: Arc<InMemoryCoordinator>,
    pub slot: Arc<JobSlot>,
    pub manager: ReshardingListenerManager,
}

impl Harness {
    /// A standard job named `job_name` watching its default sharding node.
    pub fn new(job_name: &str) -> Self {
        Self::with_kind(job_name, JobKind::Standard)
    }

    pub fn with_kind(
        job_name: &str,
        kind: JobKind,
    ) -> Self {
        enable_logger();
        let coordinator = Arc::new(InMemoryCoordinator::new().expect("start coordinator"));
        let slot = Arc::new(JobSlot::new());
        let manager = ReshardingListenerManager::new(
            job_name,
            kind,
            coordinator.clone(),
            slot.clone(),
            &Settings::default(),
        );
        Self {
            coordinator,
            slot,
            manager,
        }
    }

    pub fn path(&self) -> String {
        self.manager.path().to_string()
    }

    /// Applies a mutation and waits for its watch delivery.
    pub fn apply(
        &self,
        mutation: impl FnOnce(&InMemoryCoordinator, &str) -> Result<()>,
    ) {
        mutation(&self.coordinator, &self.path()).expect("apply mutation");
        assert!(self.coordinator.sync(WAIT_TIMEOUT), "watch delivery timed out");
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.coordinator.close();
    }
}

/// Blocks inside the callback until released.
pub struct GateJob {
    started_tx: crossbeam_channel::Sender<()>,
    started_rx: crossbeam_channel::Receiver<()>,
    release_tx: crossbeam_channel::Sender<()>,
    release_rx: crossbeam_channel::Receiver<()>,
    calls: AtomicUsize,
}

impl Default for GateJob {
    fn default() -> Self {
        let (started_tx, started_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        Self {
            started_tx,
            started_rx,
            release_tx,
            release_rx,
            calls: AtomicUsize::new(0),
        }
    }
}

impl GateJob {
    pub fn wait_started(&self) -> bool {
        self.started_rx.recv_timeout(WAIT_TIMEOUT).is_ok()
    }

    pub fn release(&self) {
        let _ = self.release_tx.send(());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReshardingJob for GateJob {
    fn on_resharding(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.started_tx.send(());
        let _ = self.release_rx.recv_timeout(WAIT_TIMEOUT);
        Ok(())
    }
}

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use parking_lot::Mutex;

use crate::Error;
use crate::ReshardingJob;
use crate::Result;

/// Counts callbacks and tracks how many ran at the same time.
#[derive(Default)]
pub struct RecordingJob {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
}

impl RecordingJob {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ReshardingJob for RecordingJob {
    fn on_resharding(&self) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fails the first `failures` callbacks, then succeeds.
pub struct FlakyJob {
    remaining_failures: AtomicUsize,
    calls: AtomicUsize,
    panic_instead: bool,
}

impl FlakyJob {
    pub fn failing(failures: usize) -> Self {
        Self {
            remaining_failures: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
            panic_instead: false,
        }
    }

    pub fn panicking(failures: usize) -> Self {
        Self {
            panic_instead: true,
            ..Self::failing(failures)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReshardingJob for FlakyJob {
    fn on_resharding(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !failed {
            return Ok(());
        }
        if self.panic_instead {
            panic!("resharding exploded");
        }
        Err(Error::Job {
            job_name: "flaky".into(),
            reason: "shard store unavailable".into(),
        })
    }
}

/// Blocks inside the callback until released.
pub struct BlockingJob {
    started_tx: Sender<()>,
    pub started_rx: Receiver<()>,
    release_tx: Sender<()>,
    release_rx: Receiver<()>,
    calls: AtomicUsize,
    finished: Mutex<usize>,
}

impl Default for BlockingJob {
    fn default() -> Self {
        let (started_tx, started_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        Self {
            started_tx,
            started_rx,
            release_tx,
            release_rx,
            calls: AtomicUsize::new(0),
            finished: Mutex::new(0),
        }
    }
}

impl BlockingJob {
    /// Lets one blocked (or future) callback return
    pub fn release(&self) {
        let _ = self.release_tx.send(());
    }

    pub fn wait_started(
        &self,
        timeout: Duration,
    ) -> bool {
        self.started_rx.recv_timeout(timeout).is_ok()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        *self.finished.lock()
    }
}

impl ReshardingJob for BlockingJob {
    fn on_resharding(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.started_tx.send(());
        let _ = self.release_rx.recv();
        *self.finished.lock() += 1;
        Ok(())
    }
}

use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;

/// Lifecycle of a resharding listener manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ManagerState {
    /// Constructed, `start()` not called yet
    Created = 0,
    /// Watch registered, notifications are executed
    Active = 1,
    /// `shutdown()` in progress, no callback may begin
    ShuttingDown = 2,
    /// Terminal
    Shutdown = 3,
}

impl From<u8> for ManagerState {
    fn from(value: u8) -> Self {
        match value {
            0 => ManagerState::Created,
            1 => ManagerState::Active,
            2 => ManagerState::ShuttingDown,
            _ => ManagerState::Shutdown,
        }
    }
}

/// State shared by the delivery thread, the worker and the controller.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: AtomicU8,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(ManagerState::Created as u8),
        }
    }

    pub(crate) fn state(&self) -> ManagerState {
        ManagerState::from(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state() == ManagerState::Active
    }

    /// `Created -> Active`. Returns false from any other state.
    pub(crate) fn activate(&self) -> bool {
        self.state
            .compare_exchange(
                ManagerState::Created as u8,
                ManagerState::Active as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// `Created | Active -> ShuttingDown`.
    ///
    /// Returns the previous state, or the current one as `Err` when shutdown
    /// was already requested.
    pub(crate) fn begin_shutdown(&self) -> Result<ManagerState, ManagerState> {
        self.state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                match ManagerState::from(current) {
                    ManagerState::Created | ManagerState::Active => {
                        Some(ManagerState::ShuttingDown as u8)
                    }
                    _ => None,
                }
            })
            .map(ManagerState::from)
            .map_err(ManagerState::from)
    }

    pub(crate) fn finish_shutdown(&self) {
        self.state.store(ManagerState::Shutdown as u8, Ordering::SeqCst);
    }
}

use std::sync::Arc;
use std::sync::Weak;

use parking_lot::RwLock;

use super::JobResolver;
use super::ReshardingJob;

/// Non-owning handle to the current job instance.
///
/// The scheduler keeps the job alive and updates the slot when the instance
/// is replaced. A dropped job resolves to `None`.
#[derive(Default)]
pub struct JobSlot {
    current: RwLock<Option<Weak<dyn ReshardingJob>>>,
}

impl std::fmt::Debug for JobSlot {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("JobSlot")
            .field("resolvable", &self.resolve_current_job().is_some())
            .finish()
    }
}

impl JobSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job(job: &Arc<dyn ReshardingJob>) -> Self {
        let slot = Self::new();
        slot.set(job);
        slot
    }

    /// Points the slot at `job` without taking ownership.
    pub fn set(
        &self,
        job: &Arc<dyn ReshardingJob>,
    ) {
        *self.current.write() = Some(Arc::downgrade(job));
    }

    pub fn clear(&self) {
        *self.current.write() = None;
    }
}

impl JobResolver for JobSlot {
    fn resolve_current_job(&self) -> Option<Arc<dyn ReshardingJob>> {
        self.current.read().as_ref().and_then(Weak::upgrade)
    }
}

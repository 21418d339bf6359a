//! Job scheduling boundary.
//!
//! The job engine owns job instances. The resharding listener only needs to
//! know what kind of job it serves (decided once, at construction) and a way
//! to find the job instance that is current when a notification is executed.

mod slot;
pub use slot::*;


use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::Result;

/// Execution model of a job, as far as shard reassignment is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Runs on a schedule and ignores shard reassignment.
    Cron,
    /// Reacts to shard reassignment.
    Standard,
}

impl JobKind {
    /// Classifies a job from its type lineage, nearest ancestor first.
    ///
    /// Walking upward, reaching `cron_base` before `job_base` yields
    /// [`JobKind::Cron`]. Reaching `job_base` first, or neither (unknown
    /// lineage), yields [`JobKind::Standard`].
    pub fn from_lineage<I, S>(
        lineage: I,
        cron_base: &str,
        job_base: &str,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for ancestor in lineage {
            let ancestor = ancestor.as_ref();
            if ancestor == cron_base {
                return JobKind::Cron;
            }
            if ancestor == job_base {
                return JobKind::Standard;
            }
        }
        JobKind::Standard
    }

    /// Whether the watch and worker machinery is needed for this kind
    pub fn needs_resharding_notifications(self) -> bool {
        matches!(self, JobKind::Standard)
    }
}

/// The running job's resharding hook.
pub trait ReshardingJob: Send + Sync + 'static {
    /// Re-reads the job's shard set. May take arbitrarily long and may fail.
    fn on_resharding(&self) -> Result<()>;
}

/// Resolves the job instance current at dispatch time.
#[cfg_attr(test, automock)]
pub trait JobResolver: Send + Sync + 'static {
    /// `None` when the job was torn down or is being replaced.
    fn resolve_current_job(&self) -> Option<Arc<dyn ReshardingJob>>;
}

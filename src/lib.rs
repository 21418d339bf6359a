//! Resharding notifications for jobs running on a coordination service.
//!
//! A [`ReshardingListenerManager`] keeps a one-shot watch on a job's sharding
//! node alive and turns node changes into
//! [`ReshardingJob::on_resharding`] calls on a dedicated worker thread, so the
//! coordination client's delivery thread is never blocked by job logic.

mod config;
mod constants;
mod coordination;
mod errors;
mod job;
pub mod metrics;
mod sharding;

pub use config::*;
pub use coordination::*;
pub use errors::*;
pub use job::*;
pub use sharding::*;

//-----------------------------------------------------------
// Test utils

//! Resharding notification plumbing.
//!
//! - [`ReshardingWatcher`]: re-arms the one-shot watch on every delivery and
//!   classifies the event
//! - [`NotificationDispatcher`]: runs the job callback on a dedicated worker
//! - [`ReshardingListenerManager`]: decides whether any of this is needed and
//!   drives start/shutdown

mod dispatcher;
mod lifecycle;
mod manager;
mod notification;
mod watcher;

pub use dispatcher::NotificationDispatcher;
pub use lifecycle::ManagerState;
pub use manager::*;
pub use notification::*;
pub use watcher::*;

pub(crate) use lifecycle::Lifecycle;

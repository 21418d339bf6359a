//! Coordination service boundary.
//!
//! The coordination service (a ZooKeeper-like hierarchical store) is an
//! external collaborator. This module only defines what the resharding
//! listener needs from it: one-shot watch registration and the event record
//! delivered when a watch fires.
//!
//! [`InMemoryCoordinator`] is an in-process implementation for embedding and
//! tests.

mod memory;
pub use memory::*;


use std::fmt;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::Result;

/// Kind of change reported by a fired watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeEventType {
    /// Node came into existence
    Created,
    /// Node data was overwritten
    DataChanged,
    /// Node was removed
    Deleted,
    /// Child list changed
    ChildrenChanged,
    /// Anything else the client reports (session state changes, removed watches, ...)
    Other,
}

impl NodeEventType {
    /// Structural changes that mean "the shard assignment may have moved".
    pub fn is_resharding_trigger(self) -> bool {
        matches!(self, NodeEventType::Created | NodeEventType::DataChanged)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeEventType::Created => "NodeCreated",
            NodeEventType::DataChanged => "NodeDataChanged",
            NodeEventType::Deleted => "NodeDeleted",
            NodeEventType::ChildrenChanged => "NodeChildrenChanged",
            NodeEventType::Other => "Other",
        }
    }
}

impl fmt::Display for NodeEventType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event delivered to a [`NodeWatcher`] when its watch fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEvent {
    pub event_type: NodeEventType,
    pub path: String,
}

impl NodeEvent {
    pub fn new(
        event_type: NodeEventType,
        path: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            path: path.into(),
        }
    }
}

/// Receives fired watches.
///
/// Called on the coordination client's delivery thread, which is shared by
/// every watch of the client. Implementations must return promptly.
pub trait NodeWatcher: Send + Sync + 'static {
    fn process(
        &self,
        event: NodeEvent,
    );
}

/// The slice of a coordination client the resharding listener depends on.
#[cfg_attr(test, automock)]
pub trait CoordinationClient: Send + Sync + 'static {
    /// Registers a one-shot watch on `path`.
    ///
    /// The watch fires at most once, on the next create, data change or
    /// delete of the node, and then has to be registered again. Registering
    /// the same watcher on the same path before it fires has no extra effect.
    fn register_watch(
        &self,
        path: &str,
        watcher: Arc<dyn NodeWatcher>,
    ) -> Result<()>;
}

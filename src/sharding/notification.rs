use std::time::Duration;
use std::time::Instant;

use crate::NodeEvent;
use crate::NodeEventType;

const NOTIFICATION_ID_LEN: usize = 10;

/// "Invoke the job's resharding callback now", deferred to the worker.
#[derive(Debug, Clone)]
pub struct PendingNotification {
    /// Short id correlating enqueue and execution in logs
    pub id: String,
    pub event_type: NodeEventType,
    pub path: String,
    pub created_at: Instant,
}

impl PendingNotification {
    pub fn from_event(event: &NodeEvent) -> Self {
        Self {
            id: nanoid::nanoid!(NOTIFICATION_ID_LEN),
            event_type: event.event_type,
            path: event.path.clone(),
            created_at: Instant::now(),
        }
    }

    /// Time spent waiting since the event was classified
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

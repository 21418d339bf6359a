//! Resharding Notification Error Hierarchy
//!
//! Errors are categorized by the collaborator boundary they come from. None of
//! them escape `start`/`shutdown` or the watch delivery path: they are logged
//! where they occur and counted in metrics.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration source or deserialization failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration values that parsed but violate a rule
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Failures reported by the coordination service boundary
    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    /// Failures handing work to the notification worker
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Failure raised by a job's resharding callback
    #[error("Job {job_name} failed on resharding: {reason}")]
    Job { job_name: String, reason: String },

    /// Unrecoverable failures
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinationError {
    /// Attempt to create a node that already exists
    #[error("Node already exists: {0}")]
    NodeExists(String),

    /// Operation on a node that does not exist
    #[error("Node does not exist: {0}")]
    NoNode(String),

    /// Transient loss of connection to the service
    #[error("Connection lost while operating on {0}")]
    ConnectionLoss(String),

    /// Session expired, all watches are gone
    #[error("Session expired")]
    SessionExpired,

    /// Client has been closed
    #[error("Coordination client closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// Worker was told to stop, submission ignored
    #[error("Notification worker stopped")]
    Stopped,

    /// Bounded queue is full
    #[error("Notification queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// OS refused to spawn the worker thread
    #[error("Failed to spawn notification worker: {0}")]
    WorkerSpawn(String),
}

impl Error {
    /// Label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) => "config",
            Error::Coordination(_) => "coordination",
            Error::Dispatch(_) => "dispatch",
            Error::Job { .. } => "job",
            Error::Fatal(_) => "fatal",
        }
    }
}

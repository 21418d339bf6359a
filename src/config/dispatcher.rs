use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_WORKER_THREAD_PREFIX;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Pending notification queue size. 0 means unbounded.
    #[serde(default)]
    pub queue_capacity: usize,

    /// Worker thread name is `{prefix}-{job}`
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 0,
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

impl DispatcherConfig {
    pub fn is_bounded(&self) -> bool {
        self.queue_capacity > 0
    }

    pub fn thread_name(
        &self,
        job_name: &str,
    ) -> String {
        format!("{}-{}", self.thread_name_prefix, job_name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.thread_name_prefix.is_empty() {
            return Err(Error::InvalidConfig("thread_name_prefix cannot be empty".into()));
        }

        // Thread names must not contain interior NUL bytes
        if self.thread_name_prefix.contains('\0') {
            return Err(Error::InvalidConfig(
                "thread_name_prefix cannot contain NUL bytes".into(),
            ));
        }

        Ok(())
    }
}

fn default_thread_name_prefix() -> String {
    DEFAULT_WORKER_THREAD_PREFIX.to_string()
}

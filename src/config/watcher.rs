use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_CRON_BASE_TYPE;
use crate::constants::DEFAULT_JOB_BASE_TYPE;
use crate::constants::DEFAULT_NODE_PATH_TEMPLATE;
use crate::constants::JOB_NAME_PLACEHOLDER;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Node touched by the sharding collaborator after each reassignment.
    /// `{job}` is replaced with the job name.
    #[serde(default = "default_node_path_template")]
    pub node_path_template: String,

    /// Lineage marker of jobs that ignore shard reassignment
    #[serde(default = "default_cron_base_type")]
    pub cron_base_type: String,

    /// Lineage marker shared by every job
    #[serde(default = "default_job_base_type")]
    pub job_base_type: String,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            node_path_template: default_node_path_template(),
            cron_base_type: default_cron_base_type(),
            job_base_type: default_job_base_type(),
        }
    }
}

impl WatcherConfig {
    /// Resolves the watched node for `job_name`.
    pub fn node_path(
        &self,
        job_name: &str,
    ) -> String {
        self.node_path_template.replace(JOB_NAME_PLACEHOLDER, job_name)
    }

    /// Validates watcher configuration
    /// # Errors
    /// Returns `Error::InvalidConfig` when:
    /// - the template is not an absolute path or has no `{job}` placeholder
    /// - the lineage markers are empty or identical
    pub fn validate(&self) -> Result<()> {
        if !self.node_path_template.starts_with('/') {
            return Err(Error::InvalidConfig(format!(
                "node_path_template must be absolute, got {}",
                self.node_path_template
            )));
        }

        if self.node_path_template.ends_with('/') {
            return Err(Error::InvalidConfig(
                "node_path_template must not end with '/'".into(),
            ));
        }

        if !self.node_path_template.contains(JOB_NAME_PLACEHOLDER) {
            return Err(Error::InvalidConfig(format!(
                "node_path_template must contain {}",
                JOB_NAME_PLACEHOLDER
            )));
        }

        if self.cron_base_type.trim().is_empty() || self.job_base_type.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "cron_base_type and job_base_type cannot be empty".into(),
            ));
        }

        if self.cron_base_type == self.job_base_type {
            return Err(Error::InvalidConfig(format!(
                "cron_base_type and job_base_type must differ, both are {}",
                self.job_base_type
            )));
        }

        Ok(())
    }
}

fn default_node_path_template() -> String {
    DEFAULT_NODE_PATH_TEMPLATE.to_string()
}
fn default_cron_base_type() -> String {
    DEFAULT_CRON_BASE_TYPE.to_string()
}
fn default_job_base_type() -> String {
    DEFAULT_JOB_BASE_TYPE.to_string()
}

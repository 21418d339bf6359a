// -
// Coordination paths

/// Placeholder replaced by the job name in node path templates
pub(crate) const JOB_NAME_PLACEHOLDER: &str = "{job}";

/// Default node the sharding collaborator touches after every reassignment
pub(crate) const DEFAULT_NODE_PATH_TEMPLATE: &str = "/jobs/{job}/leader/sharding/necessary";

// -
// Job lineage markers

pub(crate) const DEFAULT_CRON_BASE_TYPE: &str = "CronJob";
pub(crate) const DEFAULT_JOB_BASE_TYPE: &str = "AbstractJob";

// -
// Worker threads

pub(crate) const DEFAULT_WORKER_THREAD_PREFIX: &str = "reshard-notify-watcher";
pub(crate) const DELIVERY_THREAD_NAME: &str = "coordination-event-delivery";

// -
// Metric labels

pub(crate) const DROP_REASON_STOPPED: &str = "stopped";
pub(crate) const DROP_REASON_QUEUE_FULL: &str = "queue_full";
pub(crate) const DROP_REASON_INACTIVE: &str = "inactive";
pub(crate) const DROP_REASON_JOB_GONE: &str = "job_gone";
pub(crate) const DROP_REASON_DISCARDED: &str = "discarded";

pub(crate) const OUTCOME_OK: &str = "ok";
pub(crate) const OUTCOME_ERROR: &str = "error";
pub(crate) const OUTCOME_PANIC: &str = "panic";

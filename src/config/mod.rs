//! Settings for resharding listeners.
//!
//! Built-in defaults, then an optional TOML file, then `RESHARD__*`
//! environment variables. Each section validates itself.
mod dispatcher;
mod monitoring;
mod watcher;
pub use dispatcher::*;
pub use monitoring::*;
pub use watcher::*;

use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

const ENV_PREFIX: &str = "RESHARD";

/// Everything a [`ReshardingListenerManager`](crate::ReshardingListenerManager)
/// reads at construction.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Which node to watch and how to classify jobs
    #[serde(default)]
    pub watcher: WatcherConfig,
    /// Notification worker parameters
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// Metrics exporter settings
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Settings {
    /// Loads settings without validating them.
    ///
    /// The file named by `CONFIG_PATH` (when set) overrides the defaults and
    /// `RESHARD__<SECTION>__<KEY>` variables override both. Call `validate()`
    /// before handing the result to a manager.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("RESHARD__DISPATCHER__QUEUE_CAPACITY", "16");
    /// let cfg = Settings::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Layers the file at `path` over `self`, then re-applies the
    /// environment. Not validated.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.watcher.validate()?;
        self.dispatcher.validate()?;
        self.monitoring.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}

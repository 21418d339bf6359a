use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Prometheus export of the resharding listener metrics.
///
/// The library never starts the exporter on its own; hosts call
/// [`metrics::serve`](crate::metrics::serve) with this section.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub prometheus_enabled: bool,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: IpAddr,

    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            prometheus_enabled: false,
            listen_addr: default_listen_addr(),
            prometheus_port: default_prometheus_port(),
        }
    }
}

impl MonitoringConfig {
    /// Address the `/metrics` endpoint binds to
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_addr, self.prometheus_port)
    }

    /// # Errors
    /// `Error::InvalidConfig` when export is enabled on port 0 or on a
    /// privileged port.
    pub fn validate(&self) -> Result<()> {
        if !self.prometheus_enabled {
            if self.prometheus_port != default_prometheus_port() {
                tracing::warn!(
                    port = self.prometheus_port,
                    "prometheus_port set while metrics export is disabled"
                );
            }
            return Ok(());
        }

        match self.prometheus_port {
            0 => Err(Error::InvalidConfig(
                "prometheus_port must be set when metrics export is enabled".into(),
            )),
            port if port < 1024 => Err(Error::InvalidConfig(format!(
                "prometheus_port {} requires elevated privileges",
                port
            ))),
            _ => Ok(()),
        }
    }
}

fn default_listen_addr() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_prometheus_port() -> u16 {
    9100
}

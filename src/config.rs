//! Session configuration
//!
//! [`SessionConfig`] carries everything the session loop needs to reach the
//! console. Values come from [`Default`], a YAML file, or both, and can be
//! overridden from the environment:
//!
//! | Variable             | Field            |
//! |----------------------|------------------|
//! | `GT7_HOST`           | `host`           |
//! | `GT7_UDP_BIND`       | `bind_addr`      |
//! | `GT7_UDP_PORT`       | `receive_port`   |
//! | `GT7_HEARTBEAT_PORT` | `send_port`      |
//!
//! ```rust
//! use gt7_telemetry::SessionConfig;
//!
//! let config = SessionConfig::from_yaml_str("host: 192.168.1.40\n").unwrap();
//! assert_eq!(config.host, "192.168.1.40");
//! assert_eq!(config.receive_port, 33740);
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::protocol::{HEARTBEAT_PACKET_INTERVAL, HEARTBEAT_PORT, READ_TIMEOUT, TELEMETRY_PORT};
use crate::{Result, TelemetryError};

pub const ENV_HOST: &str = "GT7_HOST";
pub const ENV_BIND: &str = "GT7_UDP_BIND";
pub const ENV_RECEIVE_PORT: &str = "GT7_UDP_PORT";
pub const ENV_HEARTBEAT_PORT: &str = "GT7_HEARTBEAT_PORT";

/// Connection settings for one console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Console host name or address
    pub host: String,
    /// Console port that receives heartbeats
    pub send_port: u16,
    /// Local port the telemetry stream arrives on, 0 for any free port
    pub receive_port: u16,
    /// Local address to bind
    pub bind_addr: IpAddr,
    /// Read deadline armed after every heartbeat
    pub read_timeout_ms: u64,
    /// Datagrams after which a keep-alive heartbeat is sent while data flows
    pub heartbeat_packet_interval: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            send_port: HEARTBEAT_PORT,
            receive_port: TELEMETRY_PORT,
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            read_timeout_ms: READ_TIMEOUT.as_millis() as u64,
            heartbeat_packet_interval: HEARTBEAT_PACKET_INTERVAL,
        }
    }
}

impl SessionConfig {
    /// Defaults pointed at `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into(), ..Self::default() }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Parse and validate a YAML document. Missing keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|e| TelemetryError::config(format!("invalid session config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|source| TelemetryError::ConfigFile { path: path.to_path_buf(), source })?;
        debug!("Loaded session config from {}", path.display());
        Self::from_yaml_str(&yaml)
    }

    /// Apply `GT7_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup, keyed by the `GT7_*` names.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(host) = lookup(ENV_HOST) {
            self.host = host;
        }
        if let Some(bind) = lookup(ENV_BIND) {
            self.bind_addr = bind.trim().parse().map_err(|_| {
                TelemetryError::config(format!("{ENV_BIND} is not an IP address: {bind:?}"))
            })?;
        }
        if let Some(port) = lookup(ENV_RECEIVE_PORT) {
            self.receive_port = parse_port(ENV_RECEIVE_PORT, &port)?;
        }
        if let Some(port) = lookup(ENV_HEARTBEAT_PORT) {
            self.send_port = parse_port(ENV_HEARTBEAT_PORT, &port)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject values the session loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(TelemetryError::config("host must not be empty"));
        }
        if self.send_port == 0 {
            return Err(TelemetryError::config("send_port must be non-zero"));
        }
        if self.read_timeout_ms == 0 {
            return Err(TelemetryError::config("read_timeout_ms must be non-zero"));
        }
        if self.heartbeat_packet_interval == 0 {
            return Err(TelemetryError::config("heartbeat_packet_interval must be non-zero"));
        }
        Ok(())
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16> {
    value
        .trim()
        .parse()
        .map_err(|_| TelemetryError::config(format!("{key} is not a port number: {value:?}")))
}

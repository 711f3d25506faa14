//! Error types for the telemetry client.
//!
//! Every fallible operation in the crate returns [`TelemetryError`]. Errors are
//! split by how the session loop treats them:
//!
//! - **Fatal**: the session cannot start at all (host resolution, socket bind,
//!   invalid configuration). These are returned from
//!   [`SessionManager::start`](crate::SessionManager::start).
//! - **Recoverable**: a single datagram or heartbeat failed (send/receive I/O,
//!   bad magic after decryption, truncated packet). The loop logs them and
//!   keeps running.
//!
//! A read timeout is not an error at all; it is reported as `Ok(None)` by
//! [`Link::recv`](crate::transport::Link::recv) and answered with a heartbeat.
//!
//! ```rust
//! use gt7_telemetry::TelemetryError;
//!
//! let error = TelemetryError::bad_magic(0x1234_5678);
//! assert!(!error.is_fatal());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Failed to resolve simulator host '{host}'")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to bind telemetry socket on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to send heartbeat to {target}")]
    Heartbeat {
        target: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to receive telemetry datagram")]
    Receive {
        #[source]
        source: std::io::Error,
    },

    #[error("Packet too short: {len} bytes, need at least {required}")]
    PacketTooShort { len: usize, required: usize },

    #[error("Decryption rejected: magic {found:#010x} does not match")]
    BadMagic { found: u32 },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("Cannot read configuration file: {path}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Session is already running")]
    AlreadyRunning,
}

impl TelemetryError {
    /// Returns whether this error aborts a session instead of being skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TelemetryError::Resolve { .. }
                | TelemetryError::Bind { .. }
                | TelemetryError::Config { .. }
                | TelemetryError::ConfigFile { .. }
                | TelemetryError::AlreadyRunning
        )
    }

    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Resolve { .. } => true,
            TelemetryError::Bind { .. } => true,
            TelemetryError::Heartbeat { .. } => true,
            TelemetryError::Receive { .. } => true,
            TelemetryError::PacketTooShort { .. } => false,
            TelemetryError::BadMagic { .. } => false,
            TelemetryError::Config { .. } => false,
            TelemetryError::ConfigFile { .. } => false,
            TelemetryError::AlreadyRunning => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::Resolve { .. } => vec![
                "Check the console IP address or host name",
                "Verify the console is on the same network",
            ],
            TelemetryError::Bind { .. } => vec![
                "Close other telemetry tools listening on the receive port",
                "Check the bind address exists on this machine",
                "Use a different receive port",
            ],
            TelemetryError::Heartbeat { .. } => vec![
                "Verify the console is powered on and reachable",
                "Check firewall rules for outgoing UDP",
            ],
            TelemetryError::Receive { .. } => vec![
                "Check firewall rules for incoming UDP",
                "Verify the network link to the console",
            ],
            TelemetryError::PacketTooShort { .. } => vec![
                "Ignore the datagram, the next one usually arrives within 17ms",
                "Check no other sender targets the receive port",
            ],
            TelemetryError::BadMagic { .. } => vec![
                "Ignore the datagram and wait for the next one",
                "Verify the game version uses the supported packet format",
            ],
            TelemetryError::Config { .. } => vec![
                "Check configuration values and units",
                "Remove invalid environment overrides",
            ],
            TelemetryError::ConfigFile { .. } => vec![
                "Check the file exists and is readable",
                "Check file permissions",
            ],
            TelemetryError::AlreadyRunning => vec![
                "Stop the running session before starting again",
                "Share the running manager instead of starting a second loop",
            ],
        }
    }

    /// Helper constructor for host resolution failures.
    pub fn resolve_failed(host: impl Into<String>, source: std::io::Error) -> Self {
        TelemetryError::Resolve { host: host.into(), source }
    }

    /// Helper constructor for socket bind failures.
    pub fn bind_failed(addr: SocketAddr, source: std::io::Error) -> Self {
        TelemetryError::Bind { addr, source }
    }

    /// Helper constructor for heartbeat send failures.
    pub fn heartbeat_failed(target: SocketAddr, source: std::io::Error) -> Self {
        TelemetryError::Heartbeat { target, source }
    }

    /// Helper constructor for datagrams shorter than the layout requires.
    pub fn packet_too_short(len: usize, required: usize) -> Self {
        TelemetryError::PacketTooShort { len, required }
    }

    /// Helper constructor for magic mismatches after decryption.
    pub fn bad_magic(found: u32) -> Self {
        TelemetryError::BadMagic { found }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        TelemetryError::Config { details: details.into() }
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(err: std::io::Error) -> Self {
        TelemetryError::Receive { source: err }
    }
}

//! Live telemetry client for Gran Turismo 7.
//!
//! The console streams encrypted telemetry over UDP to whoever keeps sending
//! it heartbeats. This crate keeps that session alive, decrypts each
//! datagram, decodes it into a [`TelemetrySnapshot`] and publishes the latest
//! one to any number of readers.
//!
//! # Features
//!
//! - **Session management**: heartbeat, read deadline, rebind and stop
//! - **Decryption**: Salsa20 with the per-packet IV, magic-checked
//! - **Decoding**: the full fixed packet layout plus derived values (km/h,
//!   slip ratios, pedal percentages, status flags)
//! - **Publication**: lock-free latest snapshot and throttled streams
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gt7_telemetry::{SessionConfig, SessionManager};
//!
//! #[tokio::main]
//! async fn main() -> gt7_telemetry::Result<()> {
//!     let config = SessionConfig::new("192.168.1.40").with_env_overrides()?;
//!     let manager = Arc::new(SessionManager::new(config)?);
//!     let session = Arc::clone(&manager).spawn();
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!     let snapshot = manager.last_snapshot();
//!     println!("lap {} at {:.0} rpm", snapshot.current_lap, snapshot.rpm);
//!
//!     manager.stop();
//!     session.await.ok();
//!     Ok(())
//! }
//! ```
//!
//! The decryption and decoding stages are plain functions and can be used on
//! their own, e.g. for captured datagrams:
//!
//! ```rust
//! use gt7_telemetry::{cipher, decoder};
//!
//! fn speed_of(datagram: &[u8]) -> gt7_telemetry::Result<f32> {
//!     let plain = cipher::decrypt(datagram)?;
//!     Ok(decoder::decode(&plain)?.speed_kph)
//! }
//! # assert!(speed_of(&[0u8; 16]).is_err());
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Packet pipeline
pub mod cipher;
pub mod decoder;
pub mod protocol;

// Session and transport
pub mod session;
pub mod stream;
pub mod transport;

// Core exports
pub use config::SessionConfig;
pub use error::*;
pub use session::SessionManager;
pub use transport::{Endpoint, Link, UdpEndpoint};
pub use types::*;

//! Core types for decoded telemetry.
//!
//! - [`TelemetrySnapshot`] is the fully decoded state of one packet
//! - [`StatusFlags`] wraps the two packed flag bytes, reserved bits included
//! - [`Wheels`], [`Vec3`] and [`Rotation`] group per-wheel and spatial values
//! - [`SessionSummary`] aggregates values across accepted packets
//! - [`UpdateRate`] controls subscription throttling
//!
//! ```rust
//! use gt7_telemetry::types::{StatusFlags, flag};
//!
//! let flags = StatusFlags::from_bytes([0b0000_0001, 0b0000_1000]);
//! assert!(flags.in_race());
//! assert!(flags.has_flag(flag::TCS));
//! ```

mod flags;
mod snapshot;
mod summary;
mod update_rate;

pub use flags::{StatusFlags, flag};
pub use snapshot::{Rotation, TelemetrySnapshot, Vec3, Wheels};
pub use summary::SessionSummary;
pub use update_rate::{SOURCE_HZ, UpdateRate};

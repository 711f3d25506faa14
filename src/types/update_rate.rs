//! Update rate control for snapshot subscriptions

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Packet rate of the console stream.
pub const SOURCE_HZ: u32 = 60;

/// Update rate for snapshot streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum UpdateRate {
    /// Every accepted snapshot
    Native,

    /// At most this many snapshots per second, latest wins
    Max(u32),
}

impl UpdateRate {
    /// Collapse rates the stream can never exceed into `Native`.
    pub fn normalize(self) -> Self {
        match self {
            UpdateRate::Max(hz) if hz == 0 || hz >= SOURCE_HZ => UpdateRate::Native,
            other => other,
        }
    }

    /// Throttle interval, if throttling applies.
    pub fn interval(self) -> Option<Duration> {
        match self.normalize() {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / f64::from(hz))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_at_or_above_source_are_native() {
        assert_eq!(UpdateRate::Max(60).normalize(), UpdateRate::Native);
        assert_eq!(UpdateRate::Max(144).interval(), None);
        assert_eq!(UpdateRate::Max(0).normalize(), UpdateRate::Native);
    }

    #[test]
    fn throttled_rate_has_interval() {
        assert_eq!(UpdateRate::Max(10).interval(), Some(Duration::from_millis(100)));
        assert_eq!(UpdateRate::Native.interval(), None);
    }
}

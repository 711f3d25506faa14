//! Decoded telemetry snapshot

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::StatusFlags;

/// One value per wheel: front-left, front-right, rear-left, rear-right.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Wheels<T> {
    pub fl: T,
    pub fr: T,
    pub rl: T,
    pub rr: T,
}

impl<T> Wheels<T> {
    pub fn new(fl: T, fr: T, rl: T, rr: T) -> Self {
        Self { fl, fr, rl, rr }
    }

    /// Apply `f` to every wheel.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Wheels<U> {
        Wheels { fl: f(self.fl), fr: f(self.fr), rl: f(self.rl), rr: f(self.rr) }
    }

    /// Pair up two per-wheel values.
    pub fn zip<U>(self, other: Wheels<U>) -> Wheels<(T, U)> {
        Wheels {
            fl: (self.fl, other.fl),
            fr: (self.fr, other.fr),
            rl: (self.rl, other.rl),
            rr: (self.rr, other.rr),
        }
    }

    /// Values in FL, FR, RL, RR order.
    pub fn into_array(self) -> [T; 4] {
        [self.fl, self.fr, self.rl, self.rr]
    }
}

impl<T> From<[T; 4]> for Wheels<T> {
    fn from([fl, fr, rl, rr]: [T; 4]) -> Self {
        Self { fl, fr, rl, rr }
    }
}

/// World-space vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Car orientation as reported by the simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Rotation {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

/// Complete decoded state of one accepted telemetry packet.
///
/// Snapshots are built in one pass by [`decode`](crate::decoder::decode) and
/// published behind an `Arc`; they are never mutated afterwards. The
/// `Default` value (all zeros) is what readers see before the first packet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct TelemetrySnapshot {
    // === Identity / timing ===
    /// Sequence id used for duplicate and reorder filtering
    pub packet_id: u32,
    pub current_lap: i16,
    pub total_laps: i16,
    /// Best lap time in milliseconds, -1 when no lap was set
    pub best_lap_ms: i32,
    /// Last lap time in milliseconds, -1 when no lap was set
    pub last_lap_ms: i32,
    /// Whole seconds on track
    pub time_on_track_secs: u32,
    pub current_position: i16,
    pub total_positions: i16,
    pub car_id: i32,

    // === Powertrain ===
    pub rpm: f32,
    pub rev_warning_rpm: u16,
    pub rev_limiter_rpm: u16,
    pub estimated_top_speed_kph: i16,
    /// 0 is neutral/reverse as reported by the game
    pub current_gear: u8,
    pub suggested_gear: u8,
    pub gear_ratios: [f32; 8],
    pub clutch: f32,
    pub clutch_engaged: f32,
    pub rpm_after_clutch: f32,
    /// Pedal position, 0-100
    pub throttle: f32,
    /// Pedal position, 0-100
    pub brake: f32,
    /// Boost pressure relative to atmosphere
    pub boost: f32,
    pub fuel_capacity: f32,
    pub current_fuel: f32,

    // === Thermal / pressure ===
    pub oil_temp: f32,
    pub oil_pressure: f32,
    pub water_temp: f32,
    pub tyre_temp: Wheels<f32>,

    // === Chassis ===
    pub ride_height_mm: f32,
    pub suspension: Wheels<f32>,
    /// Tyre diameter in meters
    pub tyre_diameter: Wheels<f32>,
    /// Contact-patch speed in km/h
    pub tyre_speed_kph: Wheels<f32>,
    /// Contact-patch speed over vehicle speed, 0 when the car is stationary
    pub slip_ratio: Wheels<f32>,

    // === Kinematics ===
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation: Rotation,
    pub angular_velocity: Vec3,
    pub speed_kph: f32,

    pub flags: StatusFlags,
}

impl TelemetrySnapshot {
    /// True for the placeholder published before any packet was accepted.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn time_on_track(&self) -> Duration {
        Duration::from_secs(u64::from(self.time_on_track_secs))
    }

    /// Best lap, if one has been set.
    pub fn best_lap(&self) -> Option<Duration> {
        lap_time(self.best_lap_ms)
    }

    /// Last completed lap, if any.
    pub fn last_lap(&self) -> Option<Duration> {
        lap_time(self.last_lap_ms)
    }

    /// Remaining fuel as a fraction of capacity.
    pub fn fuel_fraction(&self) -> Option<f32> {
        (self.fuel_capacity > 0.0).then(|| self.current_fuel / self.fuel_capacity)
    }
}

fn lap_time(ms: i32) -> Option<Duration> {
    u64::try_from(ms).ok().filter(|ms| *ms > 0).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_snapshot_is_empty() {
        let snapshot = TelemetrySnapshot::default();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.best_lap(), None);
        assert_eq!(snapshot.fuel_fraction(), None);

        let moved = TelemetrySnapshot { packet_id: 1, ..Default::default() };
        assert!(!moved.is_empty());
    }

    #[test]
    fn unset_lap_times_are_none() {
        let snapshot = TelemetrySnapshot { best_lap_ms: -1, last_lap_ms: 83_456, ..Default::default() };
        assert_eq!(snapshot.best_lap(), None);
        assert_eq!(snapshot.last_lap(), Some(Duration::from_millis(83_456)));
    }

    #[test]
    fn wheels_map_and_zip_keep_positions() {
        let diameters = Wheels::new(0.5_f32, 0.5, 0.75, 0.75);
        let speeds = Wheels::from([1.0_f32, 2.0, 3.0, 4.0]);
        let product = diameters.zip(speeds).map(|(d, s)| d * s);
        assert_eq!(product.into_array(), [0.5, 1.0, 2.25, 3.0]);
    }

    #[test]
    fn snapshot_serializes_with_nested_groups() {
        let snapshot = TelemetrySnapshot {
            packet_id: 9,
            tyre_temp: Wheels::new(80.0, 81.0, 82.0, 83.0),
            flags: StatusFlags(0x0081),
            ..Default::default()
        };
        let yaml = serde_yaml_ng::to_string(&snapshot).expect("snapshot serializes");
        let back: TelemetrySnapshot = serde_yaml_ng::from_str(&yaml).expect("snapshot parses");
        assert_eq!(back, snapshot);
    }
}

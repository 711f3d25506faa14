//! Session-level aggregates maintained across accepted packets

use serde::{Deserialize, Serialize};

use super::TelemetrySnapshot;

/// Running aggregates for the current session.
///
/// Updated by the session loop for every accepted snapshot and published
/// alongside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SessionSummary {
    /// Timing marker of the current timed segment. Zeroed whenever the car
    /// reports lap zero; lap timers set it from their own clock.
    pub special_packet_time: i64,
    /// Best lap reported by the game, in milliseconds
    pub best_lap_ms: Option<i32>,
    pub min_ride_height_mm: Option<f32>,
    pub max_speed_kph: Option<f32>,
    pub packets_accepted: u64,
}

impl SessionSummary {
    /// Fold one accepted snapshot into the aggregates.
    pub fn observe(&mut self, snapshot: &TelemetrySnapshot) {
        self.packets_accepted += 1;

        if snapshot.current_lap == 0 {
            self.special_packet_time = 0;
        }

        if snapshot.best_lap_ms > 0 {
            self.best_lap_ms = Some(snapshot.best_lap_ms);
        }

        if snapshot.flags.in_race() && !snapshot.flags.paused() {
            let height = snapshot.ride_height_mm;
            self.min_ride_height_mm =
                Some(self.min_ride_height_mm.map_or(height, |min| min.min(height)));
        }

        let speed = snapshot.speed_kph;
        self.max_speed_kph = Some(self.max_speed_kph.map_or(speed, |max| max.max(speed)));
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StatusFlags, flag};

    fn snapshot(lap: i16, speed: f32, height: f32) -> TelemetrySnapshot {
        TelemetrySnapshot {
            current_lap: lap,
            speed_kph: speed,
            ride_height_mm: height,
            flags: StatusFlags(flag::IN_RACE),
            ..Default::default()
        }
    }

    #[test]
    fn lap_zero_resets_special_packet_time() {
        let mut summary = SessionSummary { special_packet_time: 12_345, ..Default::default() };

        summary.observe(&snapshot(2, 100.0, 80.0));
        assert_eq!(summary.special_packet_time, 12_345);

        summary.observe(&snapshot(0, 0.0, 80.0));
        assert_eq!(summary.special_packet_time, 0);
    }

    #[test]
    fn tracks_extremes() {
        let mut summary = SessionSummary::default();
        summary.observe(&snapshot(1, 120.0, 85.0));
        summary.observe(&snapshot(1, 240.5, 71.0));
        summary.observe(&snapshot(1, 180.0, 90.0));

        assert_eq!(summary.max_speed_kph, Some(240.5));
        assert_eq!(summary.min_ride_height_mm, Some(71.0));
        assert_eq!(summary.packets_accepted, 3);
    }

    #[test]
    fn ride_height_ignored_outside_race() {
        let mut summary = SessionSummary::default();
        let mut parked = snapshot(0, 0.0, 10.0);
        parked.flags = StatusFlags(0);
        summary.observe(&parked);
        assert_eq!(summary.min_ride_height_mm, None);
    }

    #[test]
    fn best_lap_only_when_set() {
        let mut summary = SessionSummary::default();
        summary.observe(&TelemetrySnapshot { best_lap_ms: -1, ..Default::default() });
        assert_eq!(summary.best_lap_ms, None);

        summary.observe(&TelemetrySnapshot { best_lap_ms: 95_210, ..Default::default() });
        assert_eq!(summary.best_lap_ms, Some(95_210));

        summary.reset();
        assert_eq!(summary, SessionSummary::default());
    }
}

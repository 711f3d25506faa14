//! Plaintext packet decoder
//!
//! Turns a decrypted, magic-checked packet into a [`TelemetrySnapshot`]. All
//! fields are little-endian at the fixed offsets in [`layout`]. Derived
//! values (km/h speeds, slip ratios, pedal scale) are computed here so every
//! consumer sees the same numbers.

use crate::protocol::layout;
use crate::types::{Rotation, StatusFlags, TelemetrySnapshot, Vec3, Wheels};
use crate::{Result, TelemetryError};

const MS_TO_KPH: f32 = 3.6;
const PEDAL_SCALE: f32 = 2.55;

/// Read only the sequence id of a plaintext packet.
pub fn packet_id(plain: &[u8]) -> Result<u32> {
    let bytes = plain
        .get(layout::PACKET_ID..layout::PACKET_ID + 4)
        .ok_or_else(|| TelemetryError::packet_too_short(plain.len(), layout::PACKET_ID + 4))?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decode a plaintext packet.
///
/// An empty buffer yields the zero-valued snapshot. Any other buffer shorter
/// than [`layout::PACKET_LEN`] is rejected so a snapshot is never partially
/// filled.
pub fn decode(plain: &[u8]) -> Result<TelemetrySnapshot> {
    if plain.is_empty() {
        return Ok(TelemetrySnapshot::default());
    }

    let packet = Packet::new(plain)?;

    let speed_kph = MS_TO_KPH * packet.f32(layout::SPEED);
    let tyre_diameter = packet.wheels(layout::TYRE_DIAMETER);
    let wheel_angular_speed = packet.wheels(layout::WHEEL_ANGULAR_SPEED);

    // Angular speeds are negative when rolling forward
    let tyre_speed_kph =
        tyre_diameter.zip(wheel_angular_speed).map(|(d, w)| (MS_TO_KPH * d * w).abs());
    let slip_ratio = if speed_kph > 0.0 {
        tyre_speed_kph.map(|tyre| tyre / speed_kph)
    } else {
        Wheels::default()
    };

    let gears = packet.u8(layout::GEARS);

    let mut gear_ratios = [0.0f32; 8];
    for (i, ratio) in gear_ratios.iter_mut().enumerate() {
        *ratio = packet.f32(layout::GEAR_RATIOS + i * 4);
    }

    Ok(TelemetrySnapshot {
        packet_id: packet.u32(layout::PACKET_ID),
        current_lap: packet.i16(layout::CURRENT_LAP),
        total_laps: packet.i16(layout::TOTAL_LAPS),
        best_lap_ms: packet.i32(layout::BEST_LAP),
        last_lap_ms: packet.i32(layout::LAST_LAP),
        time_on_track_secs: packet.u32(layout::TIME_ON_TRACK) / 1000,
        current_position: packet.i16(layout::CURRENT_POSITION),
        total_positions: packet.i16(layout::TOTAL_POSITIONS),
        car_id: packet.i32(layout::CAR_ID),

        rpm: packet.f32(layout::RPM),
        rev_warning_rpm: packet.u16(layout::REV_WARNING),
        rev_limiter_rpm: packet.u16(layout::REV_LIMITER),
        estimated_top_speed_kph: packet.i16(layout::ESTIMATED_TOP_SPEED),
        current_gear: gears & 0x0F,
        suggested_gear: gears >> 4,
        gear_ratios,
        clutch: packet.f32(layout::CLUTCH),
        clutch_engaged: packet.f32(layout::CLUTCH_ENGAGED),
        rpm_after_clutch: packet.f32(layout::RPM_AFTER_CLUTCH),
        throttle: f32::from(packet.u8(layout::THROTTLE)) / PEDAL_SCALE,
        brake: f32::from(packet.u8(layout::BRAKE)) / PEDAL_SCALE,
        boost: packet.f32(layout::BOOST) - 1.0,
        fuel_capacity: packet.f32(layout::FUEL_CAPACITY),
        current_fuel: packet.f32(layout::CURRENT_FUEL),

        oil_temp: packet.f32(layout::OIL_TEMP),
        oil_pressure: packet.f32(layout::OIL_PRESSURE),
        water_temp: packet.f32(layout::WATER_TEMP),
        tyre_temp: packet.wheels(layout::TYRE_TEMP),

        ride_height_mm: 1000.0 * packet.f32(layout::RIDE_HEIGHT),
        suspension: packet.wheels(layout::SUSPENSION),
        tyre_diameter,
        tyre_speed_kph,
        slip_ratio,

        position: packet.vec3(layout::POSITION_X, layout::POSITION_Y, layout::POSITION_Z),
        velocity: packet.vec3(layout::VELOCITY_X, layout::VELOCITY_Y, layout::VELOCITY_Z),
        rotation: Rotation {
            pitch: packet.f32(layout::ROTATION_PITCH),
            yaw: packet.f32(layout::ROTATION_YAW),
            roll: packet.f32(layout::ROTATION_ROLL),
        },
        angular_velocity: packet.vec3(
            layout::ANGULAR_VELOCITY_X,
            layout::ANGULAR_VELOCITY_Y,
            layout::ANGULAR_VELOCITY_Z,
        ),
        speed_kph,

        flags: StatusFlags::from_bytes([packet.u8(layout::FLAGS), packet.u8(layout::FLAGS + 1)]),
    })
}

/// Length-checked view over a full packet.
struct Packet<'a> {
    bytes: &'a [u8; layout::PACKET_LEN],
}

impl<'a> Packet<'a> {
    fn new(plain: &'a [u8]) -> Result<Self> {
        let bytes = plain
            .get(..layout::PACKET_LEN)
            .and_then(|head| <&[u8; layout::PACKET_LEN]>::try_from(head).ok())
            .ok_or_else(|| TelemetryError::packet_too_short(plain.len(), layout::PACKET_LEN))?;
        Ok(Self { bytes })
    }

    fn u8(&self, offset: usize) -> u8 {
        self.bytes[offset]
    }

    fn array<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[offset..offset + N]);
        out
    }

    fn u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes(self.array(offset))
    }

    fn i16(&self, offset: usize) -> i16 {
        i16::from_le_bytes(self.array(offset))
    }

    fn u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes(self.array(offset))
    }

    fn i32(&self, offset: usize) -> i32 {
        i32::from_le_bytes(self.array(offset))
    }

    fn f32(&self, offset: usize) -> f32 {
        f32::from_le_bytes(self.array(offset))
    }

    fn vec3(&self, x: usize, y: usize, z: usize) -> Vec3 {
        Vec3::new(self.f32(x), self.f32(y), self.f32(z))
    }

    fn wheels(&self, offsets: [usize; 4]) -> Wheels<f32> {
        Wheels::from(offsets).map(|offset| self.f32(offset))
    }
}

//! Wire constants for the GT7 telemetry protocol
//!
//! The console streams one encrypted datagram per simulation tick once it has
//! received a heartbeat, and stops after roughly ten seconds without one.

use std::time::Duration;

/// Port on the console that receives heartbeats.
pub const HEARTBEAT_PORT: u16 = 33739;

/// Local port the console streams telemetry to.
pub const TELEMETRY_PORT: u16 = 33740;

/// Heartbeat payload (`"A"`).
pub const HEARTBEAT_PAYLOAD: &[u8] = b"A";

/// Read deadline armed after every heartbeat.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause before the single retry of a failed heartbeat send.
pub const HEARTBEAT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Datagrams received after which an extra heartbeat is sent.
pub const HEARTBEAT_PACKET_INTERVAL: u32 = 100;

/// Receive buffer size; telemetry datagrams are far smaller.
pub const MAX_DATAGRAM_SIZE: usize = 4096;

/// Salsa20 key: the first 32 bytes of `Simulator Interface Packet GT7 ver 0.0`.
pub const CIPHER_KEY: &[u8; 32] = b"Simulator Interface Packet GT7 v";

/// Offset of the little-endian IV seed inside the encrypted datagram.
pub const IV_OFFSET: usize = 0x40;

/// Constant XORed with the IV seed to form the first nonce half.
pub const IV_XOR: u32 = 0xDEAD_BEAF;

/// Little-endian magic at offset 0 of every valid plaintext (`0S7G`).
pub const MAGIC: u32 = 0x4737_5330;

/// Byte offsets of every decoded field in the plaintext packet.
///
/// This table is pinned to a single layout. The kinematic block follows the
/// variant where position starts at 0x04, which keeps velocity clear of the
/// IV seed (0x40) and the fuel fields (0x44, 0x48).
pub mod layout {
    pub const MAGIC: usize = 0x00;

    pub const POSITION_X: usize = 0x04;
    pub const POSITION_Y: usize = 0x08;
    pub const POSITION_Z: usize = 0x0C;
    pub const VELOCITY_X: usize = 0x10;
    pub const VELOCITY_Y: usize = 0x14;
    pub const VELOCITY_Z: usize = 0x18;
    pub const ROTATION_PITCH: usize = 0x1C;
    pub const ROTATION_YAW: usize = 0x20;
    pub const ROTATION_ROLL: usize = 0x24;
    pub const ANGULAR_VELOCITY_X: usize = 0x2C;
    pub const ANGULAR_VELOCITY_Y: usize = 0x30;
    pub const ANGULAR_VELOCITY_Z: usize = 0x34;

    pub const RIDE_HEIGHT: usize = 0x38; // meters
    pub const RPM: usize = 0x3C;
    pub const CURRENT_FUEL: usize = 0x44;
    pub const FUEL_CAPACITY: usize = 0x48;
    pub const SPEED: usize = 0x4C; // m/s
    pub const BOOST: usize = 0x50; // offset by one atmosphere
    pub const OIL_PRESSURE: usize = 0x54;
    pub const WATER_TEMP: usize = 0x58;
    pub const OIL_TEMP: usize = 0x5C;
    pub const TYRE_TEMP: [usize; 4] = [0x60, 0x64, 0x68, 0x6C];

    pub const PACKET_ID: usize = 0x70;
    pub const CURRENT_LAP: usize = 0x74;
    pub const TOTAL_LAPS: usize = 0x76;
    pub const BEST_LAP: usize = 0x78;
    pub const LAST_LAP: usize = 0x7C;
    pub const TIME_ON_TRACK: usize = 0x80; // milliseconds
    pub const CURRENT_POSITION: usize = 0x84;
    pub const TOTAL_POSITIONS: usize = 0x86;
    pub const REV_WARNING: usize = 0x88;
    pub const REV_LIMITER: usize = 0x8A;
    pub const ESTIMATED_TOP_SPEED: usize = 0x8C;
    pub const FLAGS: usize = 0x8E; // two bytes
    pub const GEARS: usize = 0x90; // low nibble current, high nibble suggested
    pub const THROTTLE: usize = 0x91;
    pub const BRAKE: usize = 0x92;

    pub const WHEEL_ANGULAR_SPEED: [usize; 4] = [0xA4, 0xA8, 0xAC, 0xB0];
    pub const TYRE_DIAMETER: [usize; 4] = [0xB4, 0xB8, 0xBC, 0xC0];
    pub const SUSPENSION: [usize; 4] = [0xC4, 0xC8, 0xCC, 0xD0];

    pub const CLUTCH: usize = 0xF4;
    pub const CLUTCH_ENGAGED: usize = 0xF8;
    pub const RPM_AFTER_CLUTCH: usize = 0xFC;
    pub const GEAR_RATIOS: usize = 0x104; // eight f32 values
    pub const CAR_ID: usize = 0x124;

    /// Minimum plaintext length that holds every field above.
    pub const PACKET_LEN: usize = 0x128;
}

//! Packed status flags carried in the two flag bytes at 0x8E/0x8F

use serde::{Deserialize, Serialize};

/// Bit masks for [`StatusFlags`], first flag byte in the low half.
pub mod flag {
    pub const IN_RACE: u16 = 1 << 0;
    pub const PAUSED: u16 = 1 << 1;
    pub const LOADING: u16 = 1 << 2;
    pub const IN_GEAR: u16 = 1 << 3;
    pub const HAS_TURBO: u16 = 1 << 4;
    pub const REV_LIMITER_FLASHING: u16 = 1 << 5;
    pub const HANDBRAKE: u16 = 1 << 6;
    pub const LIGHTS: u16 = 1 << 7;

    pub const LOW_BEAM: u16 = 1 << 8;
    pub const HIGH_BEAM: u16 = 1 << 9;
    pub const ASM: u16 = 1 << 10;
    pub const TCS: u16 = 1 << 11;

    /// Bits 12..=15 have no known meaning yet.
    pub const RESERVED_MASK: u16 = 0xF000;
}

/// Status bits of one telemetry packet.
///
/// The raw value is kept verbatim, including the unassigned high bits, so a
/// snapshot can be re-encoded or inspected once their meaning is known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct StatusFlags(pub u16);

impl StatusFlags {
    /// Build from the two consecutive flag bytes.
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }

    /// Check if a specific bit is set.
    pub fn is_set(&self, bit: u32) -> bool {
        bit < 16 && (self.0 & (1 << bit)) != 0
    }

    /// Check if any bit of `mask` is set.
    pub fn has_flag(&self, mask: u16) -> bool {
        (self.0 & mask) != 0
    }

    /// Get the raw value.
    pub fn value(&self) -> u16 {
        self.0
    }

    pub fn in_race(&self) -> bool {
        self.has_flag(flag::IN_RACE)
    }

    pub fn paused(&self) -> bool {
        self.has_flag(flag::PAUSED)
    }

    pub fn loading(&self) -> bool {
        self.has_flag(flag::LOADING)
    }

    pub fn in_gear(&self) -> bool {
        self.has_flag(flag::IN_GEAR)
    }

    pub fn has_turbo(&self) -> bool {
        self.has_flag(flag::HAS_TURBO)
    }

    pub fn rev_limiter_flashing(&self) -> bool {
        self.has_flag(flag::REV_LIMITER_FLASHING)
    }

    pub fn handbrake_engaged(&self) -> bool {
        self.has_flag(flag::HANDBRAKE)
    }

    pub fn lights_on(&self) -> bool {
        self.has_flag(flag::LIGHTS)
    }

    pub fn low_beam(&self) -> bool {
        self.has_flag(flag::LOW_BEAM)
    }

    pub fn high_beam(&self) -> bool {
        self.has_flag(flag::HIGH_BEAM)
    }

    pub fn asm_engaged(&self) -> bool {
        self.has_flag(flag::ASM)
    }

    pub fn tcs_engaged(&self) -> bool {
        self.has_flag(flag::TCS)
    }

    /// The four unassigned bits (12..=15) shifted down to 0..=3.
    pub fn reserved(&self) -> u8 {
        ((self.0 & flag::RESERVED_MASK) >> 12) as u8
    }
}

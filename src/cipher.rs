//! Salsa20 packet decryption
//!
//! Each datagram carries its own IV seed at [`IV_OFFSET`]. The nonce is built
//! from that seed and [`IV_XOR`], and the plaintext is only accepted when it
//! starts with [`MAGIC`].

use salsa20::Salsa20;
use salsa20::cipher::{KeyIvInit, StreamCipher};

use crate::protocol::{CIPHER_KEY, IV_OFFSET, IV_XOR, MAGIC};
use crate::{Result, TelemetryError};

/// Build the 8-byte Salsa20 nonce for an IV seed.
///
/// Layout is `(seed ^ IV_XOR)` little-endian followed by `seed` little-endian.
pub fn derive_nonce(seed: u32) -> [u8; 8] {
    let mut nonce = [0u8; 8];
    nonce[..4].copy_from_slice(&(seed ^ IV_XOR).to_le_bytes());
    nonce[4..].copy_from_slice(&seed.to_le_bytes());
    nonce
}

/// Read the IV seed from an encrypted datagram.
pub fn iv_seed(raw: &[u8]) -> Result<u32> {
    let bytes = raw
        .get(IV_OFFSET..IV_OFFSET + 4)
        .ok_or_else(|| TelemetryError::packet_too_short(raw.len(), IV_OFFSET + 4))?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decrypt a raw datagram and verify its magic.
///
/// The output has the same length as the input. Returns
/// [`TelemetryError::PacketTooShort`] when the datagram cannot hold the IV
/// seed and [`TelemetryError::BadMagic`] when the key stream did not produce
/// a valid packet.
pub fn decrypt(raw: &[u8]) -> Result<Vec<u8>> {
    let seed = iv_seed(raw)?;

    let mut plain = raw.to_vec();
    apply_keystream(&mut plain, seed);

    let magic = u32::from_le_bytes([plain[0], plain[1], plain[2], plain[3]]);
    if magic != MAGIC {
        return Err(TelemetryError::bad_magic(magic));
    }

    Ok(plain)
}

/// Encrypt a plaintext packet the way the console does.
///
/// The key stream is derived from `seed`, which is then stored at
/// [`IV_OFFSET`] of the ciphertext. The four plaintext bytes at that offset
/// are therefore not recoverable; the packet layout keeps no field there.
///
/// Used by simulators and replay tooling. Plaintexts shorter than the IV
/// seed field are padded with zeros.
pub fn encrypt(plain: &[u8], seed: u32) -> Vec<u8> {
    let mut out = plain.to_vec();
    if out.len() < IV_OFFSET + 4 {
        out.resize(IV_OFFSET + 4, 0);
    }
    apply_keystream(&mut out, seed);
    out[IV_OFFSET..IV_OFFSET + 4].copy_from_slice(&seed.to_le_bytes());
    out
}

fn apply_keystream(buf: &mut [u8], seed: u32) {
    let nonce = derive_nonce(seed);
    let mut cipher = Salsa20::new(&(*CIPHER_KEY).into(), &nonce.into());
    cipher.apply_keystream(buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::layout;
    use crate::test_utils::PacketBuilder;

    #[test]
    fn nonce_layout_matches_protocol() {
        // 0x01020304 ^ 0xDEADBEAF = 0xDFAFBDAB
        assert_eq!(
            derive_nonce(0x0102_0304),
            [0xAB, 0xBD, 0xAF, 0xDF, 0x04, 0x03, 0x02, 0x01]
        );
        assert_eq!(derive_nonce(0), [0xAF, 0xBE, 0xAD, 0xDE, 0, 0, 0, 0]);
    }

    /// Console-format ciphertext for `fixture_plaintext()` under IV seed
    /// 0x13579BDF, produced by a standalone Salsa20/20 implementation.
    const FIXTURE_SEED: u32 = 0x1357_9BDF;
    const FIXTURE_CIPHERTEXT: [u8; layout::PACKET_LEN] = [
        0x08, 0x2F, 0x35, 0xB9, 0x15, 0xF4, 0x8F, 0xF3, 0xE4, 0x65, 0x00, 0x9B,
        0x94, 0xB2, 0xD6, 0x1D, 0x71, 0x0A, 0x83, 0x83, 0xB8, 0x0E, 0xC2, 0xD7,
        0x36, 0x23, 0x9C, 0x7B, 0x1E, 0xA3, 0xE5, 0x71, 0xE5, 0xD1, 0xF4, 0x67,
        0x3D, 0x9E, 0x11, 0xAB, 0xAE, 0x72, 0xD1, 0xAE, 0x3F, 0x09, 0x80, 0x4B,
        0x3E, 0xF8, 0xC6, 0x86, 0x60, 0xCB, 0xA8, 0x57, 0xC2, 0xDA, 0xE7, 0x59,
        0xF1, 0x75, 0x2D, 0x8E, 0xDF, 0x9B, 0x57, 0x13, 0x4F, 0xFE, 0xC9, 0x65,
        0xF8, 0x64, 0xF5, 0x16, 0xAE, 0x68, 0x42, 0xB8, 0x48, 0x91, 0x86, 0x93,
        0xFE, 0x98, 0xF6, 0xEF, 0x8B, 0x32, 0x91, 0x96, 0x53, 0xC0, 0x3F, 0x56,
        0x53, 0x6B, 0xBB, 0x92, 0xCD, 0x9A, 0x1A, 0x35, 0x68, 0xFB, 0x25, 0x7F,
        0x3B, 0xF0, 0xAB, 0xB1, 0x3F, 0x95, 0x60, 0x3E, 0xDA, 0x6D, 0x79, 0x33,
        0x0B, 0xFD, 0x7B, 0x49, 0xF6, 0x23, 0x4A, 0xF5, 0xB4, 0x9D, 0x10, 0x51,
        0x61, 0x3F, 0x19, 0x51, 0x07, 0xF8, 0x9C, 0x6C, 0xCF, 0xD2, 0x4A, 0xF1,
        0x9B, 0xBD, 0xA2, 0x48, 0xEC, 0x49, 0x23, 0x3C, 0xF8, 0x92, 0x74, 0x5C,
        0x1B, 0x91, 0xB7, 0xA2, 0x6E, 0x15, 0x99, 0x6D, 0xCE, 0xF6, 0x41, 0xD5,
        0xAE, 0x00, 0x4A, 0x3F, 0x61, 0xAE, 0xCB, 0x8D, 0x06, 0xC6, 0xF8, 0x86,
        0x7E, 0xD4, 0xFB, 0x42, 0x51, 0xB4, 0x2E, 0x8A, 0x35, 0xF6, 0xC0, 0x9C,
        0xD9, 0x43, 0x3D, 0xDC, 0x64, 0xA4, 0x55, 0x1D, 0xDF, 0x70, 0x2D, 0x01,
        0xF2, 0x70, 0xC0, 0x1C, 0x1E, 0x5D, 0x5F, 0x57, 0xE7, 0x69, 0x88, 0xFF,
        0x21, 0xED, 0x6E, 0x9C, 0x5E, 0x96, 0xCD, 0xD2, 0x03, 0x82, 0xDD, 0x84,
        0xC8, 0xBC, 0xD0, 0xD9, 0xD4, 0x40, 0x2F, 0xB8, 0x04, 0x92, 0x62, 0xAC,
        0x78, 0xE3, 0x48, 0xFC, 0xDB, 0xF9, 0x65, 0x36, 0x5C, 0x9F, 0x6B, 0xF7,
        0xAC, 0xED, 0xE2, 0xCB, 0x0F, 0x39, 0xB3, 0x5C, 0xDE, 0xB4, 0x43, 0x30,
        0x5A, 0xCD, 0xB6, 0x59, 0x5E, 0x9C, 0xEC, 0x4F, 0x28, 0xE1, 0x50, 0xF7,
        0xA9, 0x8E, 0x14, 0xA5, 0x62, 0x8A, 0x52, 0x09, 0x46, 0x31, 0x3B, 0xFF,
        0x50, 0xE8, 0x71, 0xA1, 0x4D, 0xB0, 0x61, 0x15,
    ];

    fn fixture_plaintext() -> Vec<u8> {
        PacketBuilder::new()
            .packet_id(42)
            .laps(2, 0)
            .rpm(6500.0)
            .speed_ms(50.0)
            .gear_byte(0x53)
            .throttle(255)
            .flags([0b1000_0001, 0b0000_0011])
            .car_id(3367)
            .build()
    }

    #[test]
    fn decrypt_matches_known_ciphertext() {
        assert_eq!(iv_seed(&FIXTURE_CIPHERTEXT).expect("has seed"), FIXTURE_SEED);

        let plain = fixture_plaintext();
        let decrypted = decrypt(&FIXTURE_CIPHERTEXT).expect("fixture decrypts");
        assert_eq!(decrypted.len(), layout::PACKET_LEN);
        assert_eq!(decrypted[..IV_OFFSET], plain[..IV_OFFSET]);
        assert_eq!(decrypted[IV_OFFSET + 4..], plain[IV_OFFSET + 4..]);

        let snapshot = crate::decoder::decode(&decrypted).expect("fixture decodes");
        assert_eq!(snapshot.packet_id, 42);
        assert_eq!(snapshot.current_lap, 2);
        assert_eq!(snapshot.rpm, 6500.0);
        assert!((snapshot.speed_kph - 180.0).abs() < 1e-3);
        assert_eq!((snapshot.current_gear, snapshot.suggested_gear), (3, 5));
        assert_eq!(snapshot.car_id, 3367);
        assert!(snapshot.flags.in_race());
        assert!(snapshot.flags.high_beam());
    }

    #[test]
    fn encrypt_reproduces_known_ciphertext() {
        assert_eq!(encrypt(&fixture_plaintext(), FIXTURE_SEED), FIXTURE_CIPHERTEXT.to_vec());
    }

    #[test]
    fn flipped_magic_byte_in_known_ciphertext_is_rejected() {
        let mut raw = FIXTURE_CIPHERTEXT;
        raw[0] ^= 0x01;
        match decrypt(&raw) {
            Err(TelemetryError::BadMagic { found }) => assert_eq!(found, MAGIC ^ 0x01),
            other => panic!("expected BadMagic, got {other:?}"),
        }
    }

    #[test]
    fn encrypt_then_decrypt_restores_fields() {
        let plain = PacketBuilder::new().packet_id(7).rpm(6500.0).car_id(3367).build();
        let raw = encrypt(&plain, 0xCAFE_F00D);
        assert_ne!(raw[..4], plain[..4]);

        let decrypted = decrypt(&raw).expect("valid packet");
        assert_eq!(decrypted[layout::PACKET_ID..], plain[layout::PACKET_ID..]);
        assert_eq!(decrypted[..IV_OFFSET], plain[..IV_OFFSET]);
    }

    #[test]
    fn corrupted_magic_is_rejected() {
        let mut plain = PacketBuilder::new().packet_id(1).build();
        plain[0] ^= 0xFF;
        let raw = encrypt(&plain, 99);

        match decrypt(&raw) {
            Err(TelemetryError::BadMagic { found }) => assert_ne!(found, MAGIC),
            other => panic!("expected BadMagic, got {other:?}"),
        }
    }

    #[test]
    fn random_bytes_are_rejected() {
        let raw: Vec<u8> = (0..layout::PACKET_LEN).map(|i| (i * 31 % 251) as u8).collect();
        assert!(matches!(decrypt(&raw), Err(TelemetryError::BadMagic { .. })));
    }

    #[test]
    fn datagram_without_iv_is_too_short() {
        let raw = [0u8; IV_OFFSET + 3];
        match decrypt(&raw) {
            Err(TelemetryError::PacketTooShort { len, required }) => {
                assert_eq!(len, IV_OFFSET + 3);
                assert_eq!(required, IV_OFFSET + 4);
            }
            other => panic!("expected PacketTooShort, got {other:?}"),
        }
    }

    #[test]
    fn decrypt_is_deterministic() {
        let raw = encrypt(&PacketBuilder::new().packet_id(5).build(), 1234);
        assert_eq!(decrypt(&raw).ok(), decrypt(&raw).ok());
    }
}

//! Entity tags for SDP payloads.
//!
//! WHIP responses carry an `ETag` computed as the IEEE CRC-32 of the exact
//! body bytes, rendered as eight lowercase zero-padded hex digits. The
//! create path tags the offer; the ICE restart path tags the returned
//! fragment.

/// IEEE CRC-32 (reflected, polynomial 0xEDB88320).
#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB8_8320;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

/// Format the CRC-32 of `data` as an 8-hex-digit entity tag.
#[must_use]
pub fn etag_for(data: &[u8]) -> String {
    format!("{:08x}", crc32(data))
}

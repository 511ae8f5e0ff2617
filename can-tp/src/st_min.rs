//! Separation-time byte interpretation.
//!
//! The flow-control frame carries the minimum gap between consecutive frames
//! as a single byte: 0x00–0x7F are milliseconds, 0xF1–0xF9 are hundreds of
//! microseconds, everything else is reserved.

use core::time::Duration;

/// Clamp reserved separation-time values to 0x7F (127 ms).
///
/// Applied both when latching a peer's advertised value and when preparing a
/// flow-control frame of our own, so an out-of-specification byte never
/// drives pacing or reaches the wire.
pub fn normalize(raw: u8) -> u8 {
    if raw <= 0x7F || (0xF1..=0xF9).contains(&raw) {
        raw
    } else {
        0x7F
    }
}

/// Concrete pacing delay for a separation-time byte.
///
/// Reserved values fall back to the maximum millisecond delay, mirroring
/// [`normalize`].
pub fn delay(raw: u8) -> Duration {
    match raw {
        0x00..=0x7F => Duration::from_millis(u64::from(raw)),
        0xF1..=0xF9 => Duration::from_micros(u64::from(raw - 0xF0) * 100),
        _ => Duration::from_millis(0x7F),
    }
}

//! Endpoint timing and framing configuration.

use core::time::Duration;

/// Tunable parameters for an ISO-TP endpoint.
///
/// The three timeouts are independent: one for each phase of a transfer
/// that waits on the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TpConfig {
    /// How long the sender waits for a flow-control frame after a First Frame
    /// or a completed block.
    pub fc_timeout: Duration,
    /// Longest accepted gap between consecutive frames while reassembling.
    pub cf_timeout: Duration,
    /// Upper bound on a whole receive call, armed from its first step.
    pub session_timeout: Duration,
    /// Flow-control Wait frames tolerated before the send fails.
    pub wait_max: u8,
    /// Byte used to pad every outbound frame to 8 data bytes.
    pub fill: u8,
}

impl Default for TpConfig {
    fn default() -> Self {
        Self {
            fc_timeout: Duration::from_millis(250),
            cf_timeout: Duration::from_millis(250),
            session_timeout: Duration::from_millis(500),
            wait_max: 5,
            fill: 0x00,
        }
    }
}

//! Pluggable flow-control responses for the receive side.

/// Flow-control response chosen for an announced segmented transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlowControlReply {
    /// Grant the transfer with the given pacing parameters.
    ClearToSend {
        /// Consecutive frames per block (0 = unlimited).
        block_size: u8,
        /// Raw separation-time byte; reserved values are clamped before use.
        st_min: u8,
    },
    /// Refuse the transfer; the sender sees an Overflow flow-control frame.
    Overflow,
}

/// Decides the flow-control frame sent in response to a First Frame.
///
/// `announced_len` is the total length the peer declared, `capacity` the
/// session buffer's size. The machine rejects transfers that cannot fit the
/// buffer before the policy is consulted, so an implementation may use
/// `capacity` for backpressure decisions but never needs it for safety.
pub trait FlowControlPolicy {
    fn decide(&mut self, announced_len: usize, capacity: usize) -> FlowControlReply;
}

/// Default policy: grant everything at full speed.
///
/// Block size 0 and separation time 0, regardless of buffer headroom. This is
/// the tolerant-receiver behavior most ISO-TP peers expect; wrap or replace
/// it when real backpressure is needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysClearToSend;

impl FlowControlPolicy for AlwaysClearToSend {
    fn decide(&mut self, _announced_len: usize, _capacity: usize) -> FlowControlReply {
        FlowControlReply::ClearToSend {
            block_size: 0,
            st_min: 0,
        }
    }
}

/// Grant transfers with fixed pacing parameters.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    /// Consecutive frames the sender may emit per block (0 = unlimited).
    pub block_size: u8,
    /// Raw separation-time byte advertised to the sender.
    pub st_min: u8,
}

impl FlowControlPolicy for Throttle {
    fn decide(&mut self, _announced_len: usize, _capacity: usize) -> FlowControlReply {
        FlowControlReply::ClearToSend {
            block_size: self.block_size,
            st_min: self.st_min,
        }
    }
}

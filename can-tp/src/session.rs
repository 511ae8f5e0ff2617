//! Per-transfer context shared by the send and receive state machines.

use embedded_can::Id;

/// Protocol state of an in-flight transfer.
///
/// Deadlines are absolute times in clock milliseconds and travel inside the
/// state value, so nothing about a transfer lives outside its [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Idle,
    /// First Frame sent; the negotiation parameters of the next ClearToSend
    /// will be latched.
    AwaitFirstFlowControl { deadline: u64 },
    /// Block completed; waiting for permission to continue.
    AwaitFlowControl { deadline: u64 },
    /// Emitting consecutive frames, possibly paced by the separation time.
    Streaming { pace_until: Option<u64> },
    /// Receive side: waiting for a Single or First Frame.
    Listening { deadline: u64 },
    /// Receive side: collecting consecutive frames.
    Reassembling {
        session_deadline: u64,
        frame_deadline: u64,
        /// The per-frame timer only fires once a consecutive frame has been
        /// accepted.
        frame_timer_armed: bool,
    },
}

/// One point-to-point transfer: addressing, buffer and progress counters.
///
/// A session is created by the caller immediately before a send or receive
/// call and owns nothing but a borrow of the caller's buffer. For a send the
/// buffer holds the payload and [`Session::set_length`] declares its length;
/// for a receive the buffer is the reassembly destination and the length is
/// set by the transfer. The same session value may be reused for follow-up
/// transfers once a call has completed.
pub struct Session<'buf> {
    pub(crate) tx_id: Id,
    pub(crate) rx_id: Id,
    pub(crate) buffer: &'buf mut [u8],
    pub(crate) length: usize,
    pub(crate) offset: usize,
    pub(crate) sequence: u8,
    pub(crate) block_size: u8,
    pub(crate) st_min: u8,
    pub(crate) wait_count: u8,
    pub(crate) block_counter: u8,
    pub(crate) state: State,
}

impl<'buf> Session<'buf> {
    /// Create a session for the identifier pair `tx_id`/`rx_id` over the
    /// caller's buffer.
    pub fn new(tx_id: impl Into<Id>, rx_id: impl Into<Id>, buffer: &'buf mut [u8]) -> Self {
        Self {
            tx_id: tx_id.into(),
            rx_id: rx_id.into(),
            buffer,
            length: 0,
            offset: 0,
            sequence: 0,
            block_size: 0,
            st_min: 0,
            wait_count: 0,
            block_counter: 0,
            state: State::Idle,
        }
    }

    /// Declare the length of the payload held in the buffer for a send.
    ///
    /// Validation happens when the send starts: lengths beyond 4095 fail with
    /// `LengthOutOfRange`, lengths beyond the buffer capacity with
    /// `BufferTooSmall`.
    pub fn set_length(&mut self, length: usize) {
        self.length = length;
    }

    /// Identifier used for outbound frames.
    pub fn tx_id(&self) -> Id {
        self.tx_id
    }

    /// Identifier accepted for inbound frames.
    pub fn rx_id(&self) -> Id {
        self.rx_id
    }

    /// Message length: as declared for a send, as received for a receive.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Capacity of the underlying buffer.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// The message bytes (valid after a completed transfer).
    pub fn payload(&self) -> &[u8] {
        &self.buffer[..self.length]
    }

    /// Mutable view of the whole buffer, e.g. to stage a payload.
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        self.buffer
    }

    /// Drop all transfer progress and return to the idle state.
    ///
    /// The message length is kept: after a completed receive it describes the
    /// reassembled payload, and before a retry of a send it is still the
    /// declared payload length.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.sequence = 0;
        self.block_size = 0;
        self.st_min = 0;
        self.wait_count = 0;
        self.block_counter = 0;
        self.state = State::Idle;
    }
}

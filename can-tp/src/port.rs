//! Frame-level CAN access consumed by the state machines.
//!
//! The transport sits on a point-to-point connection, so a single port with a
//! transmit and a poll operation is all it needs. Concrete drivers (a
//! controller peripheral, SocketCAN, an in-memory bus for tests) implement
//! [`CanPort`] for their handle type.

use embedded_can::Id;

/// One classic CAN frame as exchanged with the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    id: Id,
    dlc: u8,
    data: [u8; 8],
}

impl CanFrame {
    /// Build a frame from up to 8 data bytes; longer input is truncated.
    pub fn new(id: impl Into<Id>, data: &[u8]) -> Self {
        let dlc = data.len().min(8);
        let mut buf = [0u8; 8];
        buf[..dlc].copy_from_slice(&data[..dlc]);
        Self {
            id: id.into(),
            dlc: dlc as u8,
            data: buf,
        }
    }

    /// CAN identifier of this frame.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Number of data bytes.
    pub fn dlc(&self) -> usize {
        usize::from(self.dlc)
    }

    /// Data bytes of this frame.
    pub fn data(&self) -> &[u8] {
        &self.data[..usize::from(self.dlc)]
    }
}

/// Non-blocking access to a CAN controller.
///
/// Both operations use the `nb` convention: [`nb::Error::WouldBlock`] means
/// "no frame pending" from [`CanPort::poll`] and "transmit queue full" from
/// [`CanPort::transmit`]. The state machines treat either as a reason to
/// yield, never as a failure.
pub trait CanPort {
    /// Driver-specific error type.
    type Error;

    /// Queue one frame for transmission.
    fn transmit(&mut self, frame: &CanFrame) -> nb::Result<(), Self::Error>;

    /// Take the next received frame, if one is available.
    fn poll(&mut self) -> nb::Result<CanFrame, Self::Error>;
}

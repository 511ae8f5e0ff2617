//! Encoding and decoding of the four ISO-TP frame kinds.

/// Longest application message the 12-bit ISO-TP length field can describe.
pub const MAX_MESSAGE_LEN: usize = 4095;
/// Application bytes carried by a Single Frame.
pub const SINGLE_FRAME_CAPACITY: usize = 7;
/// Application bytes carried by a First Frame.
pub const FIRST_FRAME_CAPACITY: usize = 6;
/// Application bytes carried by each Consecutive Frame.
pub const CONSECUTIVE_FRAME_CAPACITY: usize = 7;

const PCI_SINGLE: u8 = 0x00;
const PCI_FIRST: u8 = 0x10;
const PCI_CONSECUTIVE: u8 = 0x20;
const PCI_FLOW_CONTROL: u8 = 0x30;

/// Flow control status advertised by the receiving side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlowStatus {
    /// Clear to send more consecutive frames.
    ClearToSend,
    /// Hold off and wait for another flow control frame.
    Wait,
    /// Abort, the receiver cannot take the message.
    Overflow,
}

impl FlowStatus {
    /// Decode a status nibble.
    ///
    /// Nibbles above 1 all map to [`FlowStatus::Overflow`]: an unknown status
    /// must abort the transfer exactly like an overflow report.
    pub fn from_nibble(nibble: u8) -> Self {
        match nibble & 0x0F {
            0x0 => FlowStatus::ClearToSend,
            0x1 => FlowStatus::Wait,
            _ => FlowStatus::Overflow,
        }
    }

    /// Wire nibble for this status.
    pub fn nibble(self) -> u8 {
        match self {
            FlowStatus::ClearToSend => 0x0,
            FlowStatus::Wait => 0x1,
            FlowStatus::Overflow => 0x2,
        }
    }
}

/// A decoded ISO-TP protocol frame.
///
/// Payload fields borrow from the CAN frame they were decoded from, so a
/// `TpFrame` is only valid as long as that frame's bytes are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TpFrame<'a> {
    /// Complete message of up to 7 bytes.
    Single { data: &'a [u8] },
    /// Opens a segmented transfer; carries the total length and first 6 bytes.
    First { total_len: u16, data: &'a [u8] },
    /// One segment of an open transfer.
    Consecutive { sn: u8, data: &'a [u8] },
    /// Pacing feedback from receiver to sender.
    FlowControl {
        status: FlowStatus,
        /// Consecutive frames allowed before the next flow control (0 = unlimited).
        block_size: u8,
        /// Raw separation-time byte (see [`crate::st_min`]).
        st_min: u8,
    },
}

/// Error returned when CAN data does not hold a well-formed ISO-TP frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidFrame;

/// Serialize a protocol frame into a full 8-byte CAN payload.
///
/// Unused trailing bytes are set to `fill`, so every outbound frame goes on
/// the wire with a fixed length of 8. Fields wider than their wire
/// representation are masked or truncated to it; the state machines segment
/// payloads before encoding, so the debug assertions below never fire for
/// frames they build.
pub fn encode(frame: &TpFrame<'_>, fill: u8) -> [u8; 8] {
    let mut buf = [fill; 8];
    match frame {
        TpFrame::Single { data } => {
            debug_assert!(data.len() <= SINGLE_FRAME_CAPACITY);
            let len = data.len().min(SINGLE_FRAME_CAPACITY);
            buf[0] = PCI_SINGLE | len as u8;
            buf[1..1 + len].copy_from_slice(&data[..len]);
        }
        TpFrame::First { total_len, data } => {
            let total = *total_len;
            debug_assert!(usize::from(total) > SINGLE_FRAME_CAPACITY);
            debug_assert!(usize::from(total) <= MAX_MESSAGE_LEN);
            debug_assert!(data.len() == FIRST_FRAME_CAPACITY);
            let len = data.len().min(FIRST_FRAME_CAPACITY);
            buf[0] = PCI_FIRST | ((total >> 8) as u8 & 0x0F);
            buf[1] = (total & 0xFF) as u8;
            buf[2..2 + len].copy_from_slice(&data[..len]);
        }
        TpFrame::Consecutive { sn, data } => {
            debug_assert!(data.len() <= CONSECUTIVE_FRAME_CAPACITY);
            let len = data.len().min(CONSECUTIVE_FRAME_CAPACITY);
            buf[0] = PCI_CONSECUTIVE | (*sn & 0x0F);
            buf[1..1 + len].copy_from_slice(&data[..len]);
        }
        TpFrame::FlowControl {
            status,
            block_size,
            st_min,
        } => {
            buf[0] = PCI_FLOW_CONTROL | status.nibble();
            buf[1] = *block_size;
            buf[2] = *st_min;
        }
    }
    buf
}

/// Parse CAN data into a protocol frame.
///
/// Short frames are accepted wherever the protocol allows them (a peer that
/// does not pad its frames is still conformant), except for First Frames,
/// which must carry the full 8 bytes.
pub fn decode(data: &[u8]) -> Result<TpFrame<'_>, InvalidFrame> {
    let pci = *data.first().ok_or(InvalidFrame)?;
    match pci >> 4 {
        0x0 => {
            let len = usize::from(pci & 0x0F);
            if len > SINGLE_FRAME_CAPACITY || data.len() < 1 + len {
                return Err(InvalidFrame);
            }
            Ok(TpFrame::Single {
                data: &data[1..1 + len],
            })
        }
        0x1 => {
            if data.len() < 8 {
                return Err(InvalidFrame);
            }
            let total_len = (u16::from(pci & 0x0F) << 8) | u16::from(data[1]);
            // A length that fits a Single Frame must not open a segmented
            // transfer.
            if usize::from(total_len) <= SINGLE_FRAME_CAPACITY {
                return Err(InvalidFrame);
            }
            Ok(TpFrame::First {
                total_len,
                data: &data[2..2 + FIRST_FRAME_CAPACITY],
            })
        }
        0x2 => {
            let len = (data.len() - 1).min(CONSECUTIVE_FRAME_CAPACITY);
            Ok(TpFrame::Consecutive {
                sn: pci & 0x0F,
                data: &data[1..1 + len],
            })
        }
        0x3 => {
            if data.len() < 3 {
                return Err(InvalidFrame);
            }
            Ok(TpFrame::FlowControl {
                status: FlowStatus::from_nibble(pci & 0x0F),
                block_size: data[1],
                st_min: data[2],
            })
        }
        _ => Err(InvalidFrame),
    }
}

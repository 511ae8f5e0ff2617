//! Send-side segmentation state machine.

use core::time::Duration;

use crate::clock::{duration_millis, Clock};
use crate::error::SendError;
use crate::frame::{self, FlowStatus, TpFrame};
use crate::policy::FlowControlPolicy;
use crate::port::{CanFrame, CanPort};
use crate::session::{Session, State};
use crate::st_min;
use crate::{Endpoint, Progress};

impl<P, C, F> Endpoint<P, C, F>
where
    P: CanPort,
    C: Clock,
    F: FlowControlPolicy,
{
    /// Advance an outbound transfer by one step.
    ///
    /// `now` is the current clock reading in milliseconds; all deadlines are
    /// computed from the values passed in here, so a caller driving the
    /// machine from its own loop fully controls the time base. A step on an
    /// idle session starts a new transfer of `session.length()` bytes from
    /// the session buffer.
    ///
    /// Exactly one frame goes out per step that transmits at all. On any
    /// error the session is reset and the transfer is over.
    pub fn step_send(
        &mut self,
        session: &mut Session<'_>,
        now: u64,
    ) -> Result<Progress, SendError<P::Error>> {
        match session.state {
            State::Idle => self.begin_send(session, now),
            State::AwaitFirstFlowControl { deadline } => {
                self.await_flow_control(session, deadline, true, now)
            }
            State::AwaitFlowControl { deadline } => {
                self.await_flow_control(session, deadline, false, now)
            }
            State::Streaming { pace_until } => self.stream(session, pace_until, now),
            State::Listening { .. } | State::Reassembling { .. } => {
                // The session was abandoned mid-receive; start over.
                session.reset();
                self.begin_send(session, now)
            }
        }
    }

    fn begin_send(
        &mut self,
        session: &mut Session<'_>,
        now: u64,
    ) -> Result<Progress, SendError<P::Error>> {
        if session.length > frame::MAX_MESSAGE_LEN {
            return Err(SendError::LengthOutOfRange);
        }
        if session.length > session.buffer.len() {
            return Err(SendError::BufferTooSmall);
        }

        if session.length <= frame::SINGLE_FRAME_CAPACITY {
            let bytes = frame::encode(
                &TpFrame::Single {
                    data: &session.buffer[..session.length],
                },
                self.cfg.fill,
            );
            return match self.port.transmit(&CanFrame::new(session.tx_id, &bytes)) {
                Ok(()) => Ok(Progress::Complete),
                Err(nb::Error::WouldBlock) => Ok(Progress::WouldBlock),
                Err(nb::Error::Other(err)) => Err(SendError::Link(err)),
            };
        }

        let bytes = frame::encode(
            &TpFrame::First {
                total_len: session.length as u16,
                data: &session.buffer[..frame::FIRST_FRAME_CAPACITY],
            },
            self.cfg.fill,
        );
        match self.port.transmit(&CanFrame::new(session.tx_id, &bytes)) {
            Ok(()) => {
                session.offset = frame::FIRST_FRAME_CAPACITY;
                session.sequence = 1;
                session.wait_count = 0;
                session.block_counter = 0;
                session.state = State::AwaitFirstFlowControl {
                    deadline: now + duration_millis(self.cfg.fc_timeout),
                };
                Ok(Progress::AwaitingFlowControl)
            }
            Err(nb::Error::WouldBlock) => Ok(Progress::WouldBlock),
            Err(nb::Error::Other(err)) => Err(SendError::Link(err)),
        }
    }

    fn await_flow_control(
        &mut self,
        session: &mut Session<'_>,
        deadline: u64,
        first: bool,
        now: u64,
    ) -> Result<Progress, SendError<P::Error>> {
        if now >= deadline {
            session.reset();
            return Err(SendError::FlowControlTimeout);
        }
        loop {
            let can_frame = match self.port.poll() {
                Ok(f) => f,
                Err(nb::Error::WouldBlock) => return Ok(Progress::WouldBlock),
                Err(nb::Error::Other(err)) => {
                    session.reset();
                    return Err(SendError::Link(err));
                }
            };
            if can_frame.id() != session.rx_id {
                continue;
            }
            let (status, block_size, raw_st) = match frame::decode(can_frame.data()) {
                Ok(TpFrame::FlowControl {
                    status,
                    block_size,
                    st_min,
                }) => (status, block_size, st_min),
                // Only flow control matters while waiting; everything else on
                // this identifier is dropped.
                _ => continue,
            };
            match status {
                FlowStatus::ClearToSend => {
                    if first {
                        // Negotiation parameters are latched from the first
                        // flow-control frame only.
                        session.block_size = block_size;
                        session.st_min = st_min::normalize(raw_st);
                    }
                    session.block_counter = 0;
                    session.state = State::Streaming {
                        pace_until: pace_deadline(now, session.st_min),
                    };
                    return Ok(Progress::Pending);
                }
                FlowStatus::Wait => {
                    session.wait_count = session.wait_count.saturating_add(1);
                    if session.wait_count > self.cfg.wait_max {
                        session.reset();
                        return Err(SendError::FlowControlWaitExceeded);
                    }
                    let deadline = now + duration_millis(self.cfg.fc_timeout);
                    session.state = if first {
                        State::AwaitFirstFlowControl { deadline }
                    } else {
                        State::AwaitFlowControl { deadline }
                    };
                    return Ok(Progress::AwaitingFlowControl);
                }
                FlowStatus::Overflow => {
                    session.reset();
                    return Err(SendError::ReceiverOverflow);
                }
            }
        }
    }

    fn stream(
        &mut self,
        session: &mut Session<'_>,
        pace_until: Option<u64>,
        now: u64,
    ) -> Result<Progress, SendError<P::Error>> {
        if let Some(deadline) = pace_until {
            if now < deadline {
                return Ok(Progress::WouldBlock);
            }
        }
        let gap = st_min::delay(session.st_min);
        if gap > Duration::ZERO && gap < Duration::from_millis(1) {
            // Sub-millisecond separation times sit below the clock's
            // resolution and are waited out inline.
            self.clock.sleep(gap);
        }

        let remaining = session.length - session.offset;
        let chunk = remaining.min(frame::CONSECUTIVE_FRAME_CAPACITY);
        let end = session.offset + chunk;
        let bytes = frame::encode(
            &TpFrame::Consecutive {
                sn: session.sequence,
                data: &session.buffer[session.offset..end],
            },
            self.cfg.fill,
        );
        match self.port.transmit(&CanFrame::new(session.tx_id, &bytes)) {
            Ok(()) => {}
            Err(nb::Error::WouldBlock) => return Ok(Progress::WouldBlock),
            Err(nb::Error::Other(err)) => {
                session.reset();
                return Err(SendError::Link(err));
            }
        }

        session.offset = end;
        if session.offset == session.length {
            session.reset();
            return Ok(Progress::Complete);
        }
        session.sequence = (session.sequence + 1) & 0x0F;

        if session.block_size > 0 {
            session.block_counter += 1;
            if session.block_counter == session.block_size {
                session.block_counter = 0;
                session.state = State::AwaitFlowControl {
                    deadline: now + duration_millis(self.cfg.fc_timeout),
                };
                return Ok(Progress::AwaitingFlowControl);
            }
        }

        session.state = State::Streaming {
            pace_until: pace_deadline(now, session.st_min),
        };
        Ok(Progress::Pending)
    }
}

/// Absolute deadline before the next consecutive frame, if the separation
/// time is coarse enough for the millisecond clock.
fn pace_deadline(now: u64, st_min_raw: u8) -> Option<u64> {
    let gap = st_min::delay(st_min_raw);
    if gap >= Duration::from_millis(1) {
        Some(now + duration_millis(gap))
    } else {
        None
    }
}

//! Receive-side reassembly state machine.

use embedded_can::Id;

use crate::clock::{duration_millis, Clock};
use crate::error::ReceiveError;
use crate::frame::{self, FlowStatus, TpFrame};
use crate::policy::{FlowControlPolicy, FlowControlReply};
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
    /// Advance an inbound transfer by one step.
    ///
    /// The first step on an idle session arms the overall session deadline;
    /// it bounds the whole call no matter which phase the transfer is in.
    /// Flow-control frames, and message-opening frames outside the listening
    /// phase, are ignored; frames on other identifiers are dropped.
    ///
    /// On completion `session.length()` describes the reassembled payload in
    /// the session buffer. On any error the session is reset and the buffer
    /// may hold a partially written message.
    pub fn step_receive(
        &mut self,
        session: &mut Session<'_>,
        now: u64,
    ) -> Result<Progress, ReceiveError<P::Error>> {
        match session.state {
            State::Listening { deadline } => self.listen(session, deadline, now),
            State::Reassembling {
                session_deadline,
                frame_deadline,
                frame_timer_armed,
            } => self.reassemble(session, session_deadline, frame_deadline, frame_timer_armed, now),
            _ => {
                session.reset();
                let deadline = now + duration_millis(self.cfg.session_timeout);
                session.state = State::Listening { deadline };
                self.listen(session, deadline, now)
            }
        }
    }

    fn listen(
        &mut self,
        session: &mut Session<'_>,
        deadline: u64,
        now: u64,
    ) -> Result<Progress, ReceiveError<P::Error>> {
        if now >= deadline {
            session.reset();
            return Err(ReceiveError::SessionTimeout);
        }
        loop {
            let can_frame = match self.port.poll() {
                Ok(f) => f,
                Err(nb::Error::WouldBlock) => return Ok(Progress::WouldBlock),
                Err(nb::Error::Other(err)) => {
                    session.reset();
                    return Err(ReceiveError::Link(err));
                }
            };
            if can_frame.id() != session.rx_id {
                continue;
            }
            match frame::decode(can_frame.data()) {
                Ok(TpFrame::Single { data }) => {
                    if data.len() > session.buffer.len() {
                        session.reset();
                        return Err(ReceiveError::BufferTooSmall);
                    }
                    session.buffer[..data.len()].copy_from_slice(data);
                    session.length = data.len();
                    session.reset();
                    return Ok(Progress::Complete);
                }
                Ok(TpFrame::First { total_len, data }) => {
                    return self.accept_first(session, deadline, total_len, data, now);
                }
                // Consecutive and flow-control frames mean nothing before a
                // transfer opens; malformed frames are dropped.
                _ => continue,
            }
        }
    }

    fn accept_first(
        &mut self,
        session: &mut Session<'_>,
        session_deadline: u64,
        total_len: u16,
        head: &[u8],
        now: u64,
    ) -> Result<Progress, ReceiveError<P::Error>> {
        let total = usize::from(total_len);
        if total > session.buffer.len() {
            // Refuse before a single byte would land outside the buffer.
            let tx_id = session.tx_id;
            if let Err(err) = self.reply(tx_id, FlowStatus::Overflow, 0, 0) {
                session.reset();
                return Err(ReceiveError::Link(err));
            }
            session.reset();
            return Err(ReceiveError::BufferTooSmall);
        }

        match self.policy.decide(total, session.buffer.len()) {
            FlowControlReply::ClearToSend { block_size, st_min } => {
                let st = st_min::normalize(st_min);
                let tx_id = session.tx_id;
                if let Err(err) = self.reply(tx_id, FlowStatus::ClearToSend, block_size, st) {
                    session.reset();
                    return Err(ReceiveError::Link(err));
                }
                session.buffer[..head.len()].copy_from_slice(head);
                session.length = total;
                session.offset = head.len();
                session.sequence = 1;
                session.block_size = block_size;
                session.st_min = st;
                session.block_counter = 0;
                session.state = State::Reassembling {
                    session_deadline,
                    frame_deadline: now + duration_millis(self.cfg.cf_timeout),
                    frame_timer_armed: false,
                };
                Ok(Progress::Pending)
            }
            FlowControlReply::Overflow => {
                let tx_id = session.tx_id;
                if let Err(err) = self.reply(tx_id, FlowStatus::Overflow, 0, 0) {
                    session.reset();
                    return Err(ReceiveError::Link(err));
                }
                session.reset();
                Err(ReceiveError::BufferTooSmall)
            }
        }
    }

    fn reassemble(
        &mut self,
        session: &mut Session<'_>,
        session_deadline: u64,
        frame_deadline: u64,
        frame_timer_armed: bool,
        now: u64,
    ) -> Result<Progress, ReceiveError<P::Error>> {
        if now >= session_deadline {
            session.reset();
            return Err(ReceiveError::SessionTimeout);
        }
        if frame_timer_armed && now >= frame_deadline {
            session.reset();
            return Err(ReceiveError::ConsecutiveFrameTimeout);
        }
        loop {
            let can_frame = match self.port.poll() {
                Ok(f) => f,
                Err(nb::Error::WouldBlock) => return Ok(Progress::WouldBlock),
                Err(nb::Error::Other(err)) => {
                    session.reset();
                    return Err(ReceiveError::Link(err));
                }
            };
            if can_frame.id() != session.rx_id {
                continue;
            }
            let (sn, data) = match frame::decode(can_frame.data()) {
                Ok(TpFrame::Consecutive { sn, data }) => (sn, data),
                // Mid-transfer, only consecutive frames advance the machine.
                _ => continue,
            };
            if sn != session.sequence {
                session.reset();
                return Err(ReceiveError::SequenceMismatch);
            }

            let remaining = session.length - session.offset;
            let chunk = remaining
                .min(frame::CONSECUTIVE_FRAME_CAPACITY)
                .min(data.len());
            let end = session.offset + chunk;
            session.buffer[session.offset..end].copy_from_slice(&data[..chunk]);
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
                    // The advertised block is used up; grant the next one.
                    let tx_id = session.tx_id;
                    let block_size = session.block_size;
                    let st = session.st_min;
                    if let Err(err) = self.reply(tx_id, FlowStatus::ClearToSend, block_size, st) {
                        session.reset();
                        return Err(ReceiveError::Link(err));
                    }
                }
            }

            session.state = State::Reassembling {
                session_deadline,
                frame_deadline: now + duration_millis(self.cfg.cf_timeout),
                frame_timer_armed: true,
            };
            return Ok(Progress::Pending);
        }
    }

    /// Transmit one flow-control frame, retrying while the driver reports a
    /// full transmit queue.
    fn reply(
        &mut self,
        id: Id,
        status: FlowStatus,
        block_size: u8,
        st_min_raw: u8,
    ) -> Result<(), P::Error> {
        let bytes = frame::encode(
            &TpFrame::FlowControl {
                status,
                block_size,
                st_min: st_min_raw,
            },
            self.cfg.fill,
        );
        let can_frame = CanFrame::new(id, &bytes);
        nb::block!(self.port.transmit(&can_frame))
    }
}

//! `can-tp`: an ISO 15765-2 ("ISO-TP") transport layer for classic CAN.
//!
//! ISO-TP carries application messages of up to 4095 bytes over 8-byte CAN
//! frames by segmenting them into:
//! - a **Single Frame** (payloads of up to 7 bytes),
//! - a **First Frame** + **Consecutive Frames** (larger payloads), and
//! - **Flow Control** frames that let the receiver pace the sender.
//!
//! This crate provides:
//! - A pure frame codec ([`frame`]) and separation-time interpretation
//!   ([`st_min`]).
//! - A send-side segmentation machine and a receive-side reassembly machine,
//!   both driven through [`Endpoint`] against a caller-owned [`Session`].
//! - Blocking run-to-completion calls ([`Endpoint::send`] /
//!   [`Endpoint::receive`]) and non-blocking step functions
//!   ([`Endpoint::step_send`] / [`Endpoint::step_receive`]) for superloop or
//!   async integration.
//!
//! The crate is `no_std`-friendly and allocation-free: reassembly happens in
//! a buffer borrowed from the caller, and the CAN driver and clock are
//! abstracted behind the [`CanPort`] and [`Clock`] traits.
//!
//! # Addressing
//! Each [`Session`] is bound to one point-to-point identifier pair: frames go
//! out under `tx_id` and only frames arriving under `rx_id` are considered.
//! Normal addressing only; extended/mixed addressing and functional
//! (multicast) addressing are out of scope, as is CAN FD.
//!
//! # Flow control
//! The receive side answers every First Frame with a flow-control frame. The
//! default [`AlwaysClearToSend`] policy grants full-speed continuation
//! (block size 0, separation time 0) no matter how full the buffer is;
//! implement [`FlowControlPolicy`] to advertise real pacing or refuse
//! transfers.
//!
//! # Quick start
//! ```
//! use can_tp::{Endpoint, Session, StdClock, TpConfig};
//! use can_tp_mock::bus_pair;
//! use embedded_can::StandardId;
//!
//! let (port_a, port_b) = bus_pair();
//! let mut sender = Endpoint::new(port_a, StdClock::new(), TpConfig::default());
//! let mut receiver = Endpoint::new(port_b, StdClock::new(), TpConfig::default());
//!
//! let req_id = StandardId::new(0x7E0).unwrap();
//! let resp_id = StandardId::new(0x7E8).unwrap();
//!
//! let mut out = [0u8; 64];
//! out[..5].copy_from_slice(b"hello");
//! let mut tx_session = Session::new(req_id, resp_id, &mut out);
//! tx_session.set_length(5);
//! sender.send(&mut tx_session).unwrap();
//!
//! let mut buf = [0u8; 64];
//! let mut rx_session = Session::new(resp_id, req_id, &mut buf);
//! receiver.receive(&mut rx_session).unwrap();
//! assert_eq!(rx_session.payload(), b"hello");
//! ```
//!
//! Multi-frame transfers need both sides advancing at once: either run the
//! blocking calls on two threads, or interleave [`Endpoint::step_send`] and
//! [`Endpoint::step_receive`] from one loop.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod clock;
pub mod config;
pub mod error;
pub mod frame;
pub mod policy;
pub mod port;
pub mod session;
pub mod st_min;

mod rx;
mod tx;

use core::time::Duration;

pub use clock::Clock;
#[cfg(feature = "std")]
pub use clock::StdClock;
pub use config::TpConfig;
pub use error::{ReceiveError, SendError};
pub use frame::{FlowStatus, InvalidFrame, TpFrame};
pub use policy::{AlwaysClearToSend, FlowControlPolicy, FlowControlReply, Throttle};
pub use port::{CanFrame, CanPort};
pub use session::Session;

/// Re-exported CAN identifier types.
pub use embedded_can::{ExtendedId, Id, StandardId};

/// Interval the blocking wrappers sleep when a step has nothing to do.
const YIELD_SLEEP: Duration = Duration::from_micros(100);

/// Outcome of a single state-machine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Progress {
    /// The machine advanced; step again.
    Pending,
    /// Waiting for the peer's flow-control frame.
    AwaitingFlowControl,
    /// Nothing to do yet: no frame pending, transmit queue full, or a pacing
    /// delay has not elapsed.
    WouldBlock,
    /// Transfer finished.
    Complete,
}

/// ISO-TP endpoint: one CAN port, a clock, timing configuration and a
/// flow-control policy.
///
/// An endpoint runs at most one transfer at a time; the transfer's state
/// lives entirely in the [`Session`] passed to each call. Callers needing
/// concurrent transfers run separate endpoints on distinct identifier pairs.
pub struct Endpoint<P, C, F = AlwaysClearToSend> {
    port: P,
    clock: C,
    cfg: TpConfig,
    policy: F,
}

impl<P, C> Endpoint<P, C>
where
    P: CanPort,
    C: Clock,
{
    /// Create an endpoint with the default always-grant flow-control policy.
    pub fn new(port: P, clock: C, cfg: TpConfig) -> Self {
        Self::with_policy(port, clock, cfg, AlwaysClearToSend)
    }
}

impl<P, C, F> Endpoint<P, C, F>
where
    P: CanPort,
    C: Clock,
    F: FlowControlPolicy,
{
    /// Create an endpoint with a custom flow-control policy.
    pub fn with_policy(port: P, clock: C, cfg: TpConfig, policy: F) -> Self {
        Self {
            port,
            clock,
            cfg,
            policy,
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &TpConfig {
        &self.cfg
    }

    /// Mutable access to the configuration, e.g. to retune timeouts.
    pub fn config_mut(&mut self) -> &mut TpConfig {
        &mut self.cfg
    }

    /// Mutable access to the flow-control policy.
    pub fn policy_mut(&mut self) -> &mut F {
        &mut self.policy
    }

    /// Tear the endpoint down and hand the port and clock back.
    pub fn into_parts(self) -> (P, C) {
        (self.port, self.clock)
    }

    /// Transmit the session's payload, blocking until done or failed.
    ///
    /// Runs the send machine to completion in a busy-poll loop, yielding via
    /// [`Clock::sleep`] whenever a step reports [`Progress::WouldBlock`].
    /// Payloads of up to 7 bytes go out as one Single Frame; anything longer
    /// runs the full First Frame / Flow Control / Consecutive Frame exchange.
    pub fn send(&mut self, session: &mut Session<'_>) -> Result<(), SendError<P::Error>> {
        session.reset();
        loop {
            let now = self.clock.now_millis();
            match self.step_send(session, now)? {
                Progress::Complete => return Ok(()),
                Progress::WouldBlock => self.clock.sleep(YIELD_SLEEP),
                Progress::Pending | Progress::AwaitingFlowControl => {}
            }
        }
    }

    /// Reassemble one message into the session buffer, blocking until done or
    /// failed.
    ///
    /// The session timeout starts when the call does. On success the payload
    /// is available through [`Session::payload`].
    pub fn receive(&mut self, session: &mut Session<'_>) -> Result<(), ReceiveError<P::Error>> {
        session.reset();
        loop {
            let now = self.clock.now_millis();
            match self.step_receive(session, now)? {
                Progress::Complete => return Ok(()),
                Progress::WouldBlock => self.clock.sleep(YIELD_SLEEP),
                Progress::Pending | Progress::AwaitingFlowControl => {}
            }
        }
    }
}

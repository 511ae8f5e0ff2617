//! In-memory CAN plumbing for exercising `can-tp` without hardware.
//!
//! [`bus_pair`] wires two ports back to back: whatever one transmits, the
//! other receives. Tests keep one end as the unit under test and use the
//! other to observe traffic or inject hand-crafted frames. [`TestClock`] is a
//! manually advanced time source for deterministic timeout tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use can_tp::{CanFrame, CanPort, Clock};

/// One end of a cross-connected in-memory CAN link.
pub struct MockBus {
    inbox: Arc<Mutex<VecDeque<CanFrame>>>,
    peer: Arc<Mutex<VecDeque<CanFrame>>>,
}

/// Create two ports wired back to back.
pub fn bus_pair() -> (MockBus, MockBus) {
    let a = Arc::new(Mutex::new(VecDeque::new()));
    let b = Arc::new(Mutex::new(VecDeque::new()));
    (
        MockBus {
            inbox: Arc::clone(&a),
            peer: Arc::clone(&b),
        },
        MockBus { inbox: b, peer: a },
    )
}

impl MockBus {
    /// Push a frame straight into this port's receive queue.
    pub fn inject(&self, frame: CanFrame) {
        self.inbox.lock().unwrap().push_back(frame);
    }

    /// Frames waiting in this port's receive queue.
    pub fn pending(&self) -> usize {
        self.inbox.lock().unwrap().len()
    }
}

impl CanPort for MockBus {
    type Error = core::convert::Infallible;

    fn transmit(&mut self, frame: &CanFrame) -> nb::Result<(), Self::Error> {
        self.peer.lock().unwrap().push_back(*frame);
        Ok(())
    }

    fn poll(&mut self) -> nb::Result<CanFrame, Self::Error> {
        self.inbox
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(nb::Error::WouldBlock)
    }
}

/// Manually advanced clock; `sleep` moves virtual time forward.
///
/// Clones share the same time base, so an endpoint and the test driving it
/// can both see advances.
#[derive(Clone, Default)]
pub struct TestClock {
    micros: Arc<AtomicU64>,
}

impl TestClock {
    /// A clock starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `dur`.
    pub fn advance(&self, dur: Duration) {
        self.micros
            .fetch_add(dur.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now_millis(&self) -> u64 {
        self.micros.load(Ordering::SeqCst) / 1_000
    }

    fn sleep(&self, dur: Duration) {
        self.advance(dur);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_tp::StandardId;

    #[test]
    fn pair_crosses_frames_over() {
        let (mut a, mut b) = bus_pair();
        let id = StandardId::new(0x123).unwrap();
        a.transmit(&CanFrame::new(id, &[1, 2, 3])).unwrap();
        let frame = b.poll().unwrap();
        assert_eq!(frame.data(), &[1, 2, 3]);
        assert!(matches!(b.poll(), Err(nb::Error::WouldBlock)));
    }

    #[test]
    fn test_clock_accumulates_sub_millisecond_sleeps() {
        let clock = TestClock::new();
        for _ in 0..10 {
            clock.sleep(Duration::from_micros(100));
        }
        assert_eq!(clock.now_millis(), 1);
    }
}

//! Clock abstraction to support `std` and `no_std` environments.

use core::time::Duration;

/// Monotonic millisecond time source with a delay primitive.
///
/// The step functions take the current time as an argument, so the clock is
/// only consulted by the blocking wrappers and for sub-millisecond pacing
/// delays that sit below the clock's resolution.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed epoch.
    fn now_millis(&self) -> u64;

    /// Block the calling thread (or busy-wait) for `dur`.
    fn sleep(&self, dur: Duration);
}

pub(crate) fn duration_millis(dur: Duration) -> u64 {
    dur.as_millis() as u64
}

/// Standard library clock backed by [`std::time::Instant`].
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    start: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    /// Create a clock whose epoch is the moment of construction.
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now_millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn sleep(&self, dur: Duration) {
        std::thread::sleep(dur);
    }
}

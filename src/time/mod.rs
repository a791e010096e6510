//! Timing oracles.

use std::{cell::Cell, fmt, rc::Rc, sync::OnceLock, time::Instant};

/// Monotonic source of timestamps in seconds.
pub trait Clock {
    /// Seconds since an arbitrary fixed point.
    fn now(&self) -> f64;
}

impl<C: Clock + ?Sized> Clock for &C {
    #[inline]
    fn now(&self) -> f64 {
        (**self).now()
    }
}

/// Time provided by the operating system through [`Instant`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> f64 {
        static EPOCH: OnceLock<Instant> = OnceLock::new();

        EPOCH.get_or_init(Instant::now).elapsed().as_secs_f64()
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same time, so a test can keep a handle while a profiler
/// owns another.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ManualClock").field(&self.now.get()).finish()
    }
}

impl ManualClock {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward by `secs`.
    #[inline]
    pub fn advance(&self, secs: f64) {
        self.now.set(self.now.get() + secs);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> f64 {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic() {
        let clock = MonotonicClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn manual_clones_share_time() {
        let clock = ManualClock::new();
        let handle = clock.clone();

        handle.advance(1.5);
        handle.advance(0.5);

        assert_eq!(clock.now(), 2.0);
    }
}

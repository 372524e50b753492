//! Simulated clock.

use crate::traits::Clock;
use sonar_core::Timestamp;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Clock that only moves when told to.
///
/// Clones share the same timeline, so a test can keep one copy and hand
/// another to the driver. [`Clock::delay`] advances the timeline instead of
/// waiting.
///
/// # Examples
///
/// ```
/// use sonar_hardware::mock::SimClock;
/// use sonar_hardware::traits::Clock;
/// use std::time::Duration;
///
/// let clock = SimClock::new();
/// let copy = clock.clone();
///
/// clock.advance(Duration::from_micros(200));
/// assert_eq!(copy.now().as_nanos(), 200_000);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    nanos: Arc<AtomicU64>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the timeline at `start`.
    pub fn starting_at(start: Timestamp) -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(start.as_nanos())),
        }
    }

    /// Move the timeline forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let step = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(step, Ordering::AcqRel);
    }
}

impl Clock for SimClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_nanos(self.nanos.load(Ordering::Acquire))
    }

    fn delay(&self, duration: Duration) {
        self.advance(duration);
    }
}

//! # Kassa Testing
//!
//! Testing utilities and helpers for the Kassa workspace.
//!
//! This crate provides:
//! - Deterministic clocks for the `Clock` environment trait
//! - A Given-When-Then harness for reducers
//! - Opt-in log capture for tests
//!
//! ## Example
//!
//! ```ignore
//! use kassa_testing::{test_clock, ReducerTest};
//!
//! ReducerTest::new(OrderReducer::new())
//!     .with_env(OrderEnvironment::new(Arc::new(test_clock())))
//!     .given_state(OrderState::new())
//!     .when_action(OrderAction::Place { .. })
//!     .then_state(|state| assert!(state.order.is_some()))
//!     .run();
//! ```

use chrono::{DateTime, Utc};
use kassa_core::environment::Clock;


/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use chrono::Duration;
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use kassa_testing::mocks::FixedClock;
    /// use kassa_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when a test tells it to.
    ///
    /// Clones share the same underlying time, so a test can hand one clone
    /// to a service and advance the other.
    ///
    /// ```
    /// use kassa_testing::mocks::MutableClock;
    /// use kassa_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let start = Utc::now();
    /// let clock = MutableClock::new(start);
    /// let shared = clock.clone();
    /// clock.advance(Duration::minutes(5));
    /// assert_eq!(shared.now(), start + Duration::minutes(5));
    /// ```
    #[derive(Debug, Clone)]
    pub struct MutableClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl MutableClock {
        /// Create a clock frozen at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward (or backward, for negative durations)
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute time
        pub fn set(&self, to: DateTime<Utc>) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time = to;
        }
    }

    impl Clock for MutableClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }

    /// The instant every default test clock starts at (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }
}

/// Route `tracing` output through the test harness.
///
/// Safe to call from every test; only the first call installs the
/// subscriber. Filtering follows `RUST_LOG` and defaults to `warn`.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, MutableClock, test_clock, test_epoch};
pub use reducer_test::ReducerTest;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
        assert_eq!(time1.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_mutable_clock_shares_time_between_clones() {
        let clock = MutableClock::new(test_epoch());
        let other = clock.clone();
        clock.advance(Duration::hours(2));
        assert_eq!(other.now(), test_epoch() + Duration::hours(2));

        other.set(test_epoch());
        assert_eq!(clock.now(), test_epoch());
    }

    #[test]
    fn init_test_tracing_is_idempotent() {
        init_test_tracing();
        init_test_tracing();
    }
}

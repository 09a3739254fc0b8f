#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing barriers.
//!
//! Barrier bugs tend to show up either as hangs (someone is never released) or as early
//! releases (someone is released before everyone arrived). [`with_watchdog`] turns the first
//! kind into a test failure and [`ReleaseLog`] detects the second kind.

use std::sync::{Mutex, mpsc};
use std::thread;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

// Miri is dramatically slower for thread synchronization.
const TIMEOUT_MIRI: Duration = Duration::from_secs(60);

/// Runs a test with a timeout so that a participant stuck in a barrier fails the test instead
/// of hanging it forever.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the watchdog is disabled
/// and the test function is executed directly, so that mutation testing can detect mutations
/// that cause hangs.
///
/// # Panics
///
/// Panics if the test exceeds the timeout (when not in mutation testing mode) and resumes the
/// panic of the test function if it panicked.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let result = with_watchdog(|| 2 + 2);
/// assert_eq!(result, 4);
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    let test_thread = thread::spawn(move || {
        let result = test_fn();
        // If this fails, the watchdog has already given up on us.
        drop(tx.send(result));
    });

    let timeout = if cfg!(miri) { TIMEOUT_MIRI } else { TIMEOUT };

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_thread.join().expect("test thread already sent its result");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test did not finish within {timeout:?}, probably a participant is stuck");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_thread.join() {
            Ok(()) => panic!("test thread exited without sending a result"),
            Err(payload) => std::panic::resume_unwind(payload),
        },
    }
}

/// What a participant did, as recorded in a [`ReleaseLog`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(
    clippy::exhaustive_enums,
    reason = "private test helper, there is nothing to add later"
)]
pub enum Step {
    /// The participant is about to call into the barrier.
    Arrived,

    /// The participant has returned from the barrier.
    Released,
}

/// A globally ordered log of arrivals and releases, shared by all participants of a test.
///
/// Each participant records [`Step::Arrived`] right before calling into the barrier and
/// [`Step::Released`] right after returning from it. Afterwards, [`verify()`][Self::verify]
/// checks that in every generation, no release was recorded before every participant had
/// recorded its arrival.
#[derive(Debug, Default)]
pub struct ReleaseLog {
    entries: Mutex<Vec<(u64, usize, Step)>>,
}

impl ReleaseLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that participant `index` took `step` in `generation`.
    ///
    /// # Panics
    ///
    /// Panics if the log was poisoned by a panic on another thread.
    pub fn record(&self, generation: u64, index: usize, step: Step) {
        self.entries
            .lock()
            .expect("log is only poisoned if a participant already panicked")
            .push((generation, index, step));
    }

    /// How many entries have been recorded so far.
    ///
    /// # Panics
    ///
    /// Panics if the log was poisoned by a panic on another thread.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .expect("log is only poisoned if a participant already panicked")
            .len()
    }

    /// Whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks the log of a completed run of `generations` generations with `participants`
    /// participants.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found: a generation with a release that was
    /// recorded before all arrivals, or a generation with the wrong number of entries.
    ///
    /// # Panics
    ///
    /// Panics if the log was poisoned by a panic on another thread.
    pub fn verify(&self, participants: usize, generations: u64) -> Result<(), String> {
        let entries = self
            .entries
            .lock()
            .expect("log is only poisoned if a participant already panicked");

        for generation in 0..generations {
            let mut arrived = 0_usize;
            let mut released = 0_usize;

            for &(entry_generation, index, step) in entries.iter() {
                if entry_generation != generation {
                    continue;
                }

                match step {
                    Step::Arrived => arrived = arrived.saturating_add(1),
                    Step::Released => {
                        if arrived < participants {
                            return Err(format!(
                                "participant {index} was released in generation {generation} \
                                 after only {arrived} of {participants} arrivals"
                            ));
                        }

                        released = released.saturating_add(1);
                    }
                }
            }

            if arrived != participants || released != participants {
                return Err(format!(
                    "generation {generation} has {arrived} arrivals and {released} releases, \
                     expected {participants} of each"
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn watchdog_returns_result() {
        assert_eq!(with_watchdog(|| "released"), "released");
    }

    #[test]
    #[should_panic(expected = "participant failed")]
    fn watchdog_propagates_panic() {
        with_watchdog(|| panic!("participant failed"));
    }

    #[test]
    fn ordered_log_verifies() {
        let log = ReleaseLog::new();

        for generation in 0..2 {
            log.record(generation, 0, Step::Arrived);
            log.record(generation, 1, Step::Arrived);
            log.record(generation, 1, Step::Released);
            log.record(generation, 0, Step::Released);
        }

        assert_eq!(log.len(), 8);
        log.verify(2, 2).unwrap();
    }

    #[test]
    fn early_release_is_detected() {
        let log = ReleaseLog::new();

        log.record(0, 0, Step::Arrived);
        log.record(0, 0, Step::Released);
        log.record(0, 1, Step::Arrived);
        log.record(0, 1, Step::Released);

        let problem = log.verify(2, 1).unwrap_err();
        assert!(problem.contains("after only 1 of 2"));
    }

    #[test]
    fn missing_release_is_detected() {
        let log = ReleaseLog::new();
        assert!(log.is_empty());

        log.record(0, 0, Step::Arrived);
        log.record(0, 1, Step::Arrived);
        log.record(0, 0, Step::Released);

        assert!(log.verify(2, 1).is_err());
    }
}

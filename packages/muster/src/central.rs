use std::num::NonZero;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::debug;

use crate::{
    Barrier, BarrierBuilder, Config, LocalState, Participant, Registry, Result, wait_until,
};

/// Sense-reversing centralized barrier.
///
/// All participants decrement one shared counter. The last one to arrive resets the counter
/// and publishes the new sense in a shared flag; everyone else spins on that flag until it
/// matches their own freshly flipped sense.
///
/// This is the simplest algorithm in the package and the cheapest for small participant
/// counts. Because every participant touches the same counter and spins on the same flag, it
/// scales worst of the four.
///
/// # Example
///
/// ```
/// use std::thread;
///
/// use muster::{Barrier, CentralBarrier, Participant};
///
/// let barrier = CentralBarrier::builder().participants(2).build().unwrap();
///
/// let mut first = barrier.participant(0).unwrap();
/// let mut second = barrier.participant(1).unwrap();
///
/// let other = thread::spawn(move || second.arrive_and_wait());
/// first.arrive_and_wait();
/// other.join().unwrap();
/// ```
#[derive(Debug)]
pub struct CentralBarrier {
    config: Config,

    // Arrivals still missing in the current generation, in 1..=participants between
    // generations and never observed at 0 by anyone but the last arrival.
    remaining: AtomicUsize,

    global_sense: AtomicBool,

    registry: Registry,
}

impl CentralBarrier {
    /// Creates a builder for configuring the barrier.
    #[must_use]
    pub fn builder() -> BarrierBuilder<Self> {
        BarrierBuilder::new()
    }

    /// Creates a barrier for `participants` participants with the default configuration.
    #[must_use]
    pub fn new(participants: NonZero<usize>) -> Arc<Self> {
        Arc::new(Self::with_config(Config::new(participants)))
    }

    fn arrive(&self, local: &mut LocalState) -> u64 {
        local.sense = !local.sense;
        let sense = local.sense;

        // AcqRel: the last arrival must see everything the others did before arriving, and
        // pass it on to them through the release store of the global sense below.
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            // Nobody can start the next generation before observing the new sense, and the
            // sense is published only after the reset. So no participant ever decrements a
            // counter that has not been reset yet, and no lock is needed.
            self.remaining
                .store(self.config.participants().get(), Ordering::Relaxed);
            self.global_sense.store(sense, Ordering::Release);

            0
        } else {
            wait_until(self.config.wait_policy(), || {
                self.global_sense.load(Ordering::Acquire) == sense
            })
        }
    }
}

impl Barrier for CentralBarrier {
    type Participant = CentralParticipant;

    fn with_config(config: Config) -> Self {
        let participants = config.participants();

        debug!(
            algorithm = "central",
            participants = participants.get(),
            "barrier initialized"
        );

        Self {
            config,
            remaining: AtomicUsize::new(participants.get()),
            global_sense: AtomicBool::new(true),
            registry: Registry::new(participants, LocalState::with_sense(true)),
        }
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn participant(self: &Arc<Self>, index: usize) -> Result<CentralParticipant> {
        let local = self.registry.claim(index)?;

        Ok(CentralParticipant {
            barrier: Arc::clone(self),
            index,
            local,
        })
    }
}

/// A participant in a [`CentralBarrier`].
#[derive(Debug)]
pub struct CentralParticipant {
    barrier: Arc<CentralBarrier>,
    index: usize,
    local: LocalState,
}

impl Participant for CentralParticipant {
    fn index(&self) -> usize {
        self.index
    }

    fn generation(&self) -> u64 {
        self.local.generation
    }

    fn arrive_and_wait(&mut self) {
        let polls = self.barrier.arrive(&mut self.local);
        self.local.finish_generation(self.index, polls);
    }
}

impl Drop for CentralParticipant {
    fn drop(&mut self) {
        self.barrier.registry.release(self.index, self.local);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Mutex;
    use std::thread;

    use new_zealand::nz;
    use static_assertions::assert_impl_all;
    use testing::with_watchdog;

    use super::*;

    assert_impl_all!(CentralBarrier: Send, Sync);
    assert_impl_all!(CentralParticipant: Send);

    #[test]
    fn single_participant_never_waits() {
        let barrier = CentralBarrier::new(nz!(1));
        let mut participant = barrier.participant(0).unwrap();

        for _ in 0..10 {
            participant.arrive_and_wait();
        }

        assert_eq!(participant.generation(), 10);
        assert_eq!(barrier.remaining.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn counter_and_sense_reset_after_generation() {
        let barrier = CentralBarrier::new(nz!(1));
        let mut participant = barrier.participant(0).unwrap();

        participant.arrive_and_wait();
        assert!(!barrier.global_sense.load(Ordering::Relaxed));

        participant.arrive_and_wait();
        assert!(barrier.global_sense.load(Ordering::Relaxed));
    }

    #[test]
    fn participant_index_out_of_range() {
        let barrier = CentralBarrier::new(nz!(2));
        assert!(barrier.participant(2).is_err());
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn releases_come_after_all_arrivals() {
        const PARTICIPANTS: usize = 4;
        const GENERATIONS: usize = 100;

        with_watchdog(|| {
            let barrier = CentralBarrier::new(nz!(PARTICIPANTS));
            let log = Arc::new(Mutex::new(Vec::new()));

            let threads = (0..PARTICIPANTS)
                .map(|index| {
                    let mut participant = barrier.participant(index).unwrap();
                    let log = Arc::clone(&log);

                    thread::spawn(move || {
                        for generation in 0..GENERATIONS {
                            log.lock().unwrap().push((generation, "arrived"));
                            participant.arrive_and_wait();
                            log.lock().unwrap().push((generation, "released"));
                        }
                    })
                })
                .collect::<Vec<_>>();

            for thread in threads {
                thread.join().unwrap();
            }

            let log = log.lock().unwrap();

            for generation in 0..GENERATIONS {
                let first_release = log
                    .iter()
                    .position(|&entry| entry == (generation, "released"))
                    .unwrap();

                let arrivals_before = log
                    .iter()
                    .take(first_release)
                    .filter(|&&entry| entry == (generation, "arrived"))
                    .count();

                assert_eq!(arrivals_before, PARTICIPANTS, "generation {generation}");
            }
        });
    }
}

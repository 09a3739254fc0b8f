use std::fmt;
use std::num::NonZero;
use std::sync::Arc;

use tracing::debug;

use crate::{Config, Error, Result};

/// A reusable barrier for a fixed number of participants.
///
/// All four algorithms in this package implement this trait, so code that only needs
/// "some barrier" can be generic over it.
///
/// The life of a barrier has three steps:
///
/// 1. Build it (see [`BarrierBuilder`][crate::BarrierBuilder]). All shared state is allocated
///    and wired here and never resized afterwards.
/// 2. Claim one [`Participant`] per index via [`participant()`][Self::participant] and call
///    [`Participant::arrive_and_wait()`] from each of them, once per generation.
/// 3. Drop the participants and [`finalize()`][Self::finalize] the barrier (or simply drop the
///    last reference to it).
pub trait Barrier: fmt::Debug + Send + Sync + Sized + 'static {
    /// The handle through which one participant takes part in the barrier.
    type Participant: Participant;

    /// Allocates and wires all shared state for the given configuration.
    fn with_config(config: Config) -> Self;

    /// The configuration the barrier was built with.
    fn config(&self) -> &Config;

    /// The number of participants that must arrive before any of them is released.
    fn participants(&self) -> NonZero<usize> {
        self.config().participants()
    }

    /// Claims the participant with the given index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParticipantOutOfRange`] if `index` is not below the participant count and
    /// [`Error::ParticipantClaimed`] if another live handle already owns this index.
    fn participant(self: &Arc<Self>, index: usize) -> Result<Self::Participant>;

    /// Releases all shared state of the barrier.
    ///
    /// This only succeeds if the caller holds the last reference. Either way, the reference
    /// passed in is consumed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StillShared`] if participant handles or other clones of the barrier
    /// are still alive.
    fn finalize(self: Arc<Self>) -> Result<()> {
        match Arc::try_unwrap(self) {
            Ok(barrier) => {
                debug!(
                    participants = barrier.participants().get(),
                    "barrier finalized"
                );
                drop(barrier);
                Ok(())
            }
            Err(shared) => Err(Error::StillShared {
                owners: Arc::strong_count(&shared).saturating_sub(1),
            }),
        }
    }
}

/// One participant's handle to a [`Barrier`].
///
/// The handle owns the participant's private state. It can be moved to the thread that acts as
/// this participant but cannot be shared between threads.
pub trait Participant: fmt::Debug + Send + 'static {
    /// The stable index of this participant, in `0..participants`.
    fn index(&self) -> usize;

    /// How many generations this participant has completed so far.
    fn generation(&self) -> u64;

    /// Waits until every participant has arrived at the barrier for the current generation.
    ///
    /// Must be called exactly once per generation by every participant. If any participant
    /// never calls it, the others wait forever.
    fn arrive_and_wait(&mut self);
}

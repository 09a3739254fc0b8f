use std::fmt;
use std::marker::PhantomData;
use std::num::NonZero;
use std::sync::Arc;

use new_zealand::nz;

use crate::{Barrier, Error, Result};

const DEFAULT_SPINS_BEFORE_YIELD: NonZero<u32> = nz!(128);

/// How a participant waits for a flag or counter it depends on.
///
/// Whatever the policy, the observable ordering of a barrier is the same. The policy only
/// decides what a waiting participant does with its processor between polls.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum WaitPolicy {
    /// Busy-poll without ever giving up the processor.
    ///
    /// This gives the lowest wakeup latency when every participant has a processor of its own
    /// but can be extremely slow when participants outnumber processors.
    Spin,

    /// Busy-poll `spins` times, then yield the processor to the OS scheduler between polls.
    SpinThenYield {
        /// How many polls to spin through before starting to yield.
        spins: NonZero<u32>,
    },
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::SpinThenYield {
            spins: DEFAULT_SPINS_BEFORE_YIELD,
        }
    }
}

/// Validated configuration of a barrier instance.
///
/// Usually produced by a [`BarrierBuilder`] but can also be created directly and passed to
/// [`Barrier::with_config()`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    participants: NonZero<usize>,
    wait_policy: WaitPolicy,
}

impl Config {
    /// Creates a configuration for `participants` participants with the default wait policy.
    #[must_use]
    pub fn new(participants: NonZero<usize>) -> Self {
        Self {
            participants,
            wait_policy: WaitPolicy::default(),
        }
    }

    /// Replaces the wait policy.
    #[must_use]
    pub fn with_wait_policy(self, wait_policy: WaitPolicy) -> Self {
        Self {
            wait_policy,
            ..self
        }
    }

    /// The number of participants that must arrive before any of them is released.
    #[must_use]
    pub fn participants(&self) -> NonZero<usize> {
        self.participants
    }

    /// How participants wait while blocked in the barrier.
    #[must_use]
    pub fn wait_policy(&self) -> WaitPolicy {
        self.wait_policy
    }
}

/// Builder for any barrier type implementing [`Barrier`].
///
/// The participant count is mandatory; building without setting it (or setting it to zero)
/// fails with [`Error::NoParticipants`].
///
/// # Example
///
/// ```
/// use muster::{BarrierBuilder, ChannelTransport, DisseminationBarrier, WaitPolicy};
///
/// let barrier = BarrierBuilder::<DisseminationBarrier<ChannelTransport>>::new()
///     .participants(6)
///     .wait_policy(WaitPolicy::Spin)
///     .build()
///     .unwrap();
///
/// assert_eq!(barrier.rounds(), 3);
/// ```
pub struct BarrierBuilder<B> {
    participants: usize,
    wait_policy: WaitPolicy,

    _barrier: PhantomData<fn() -> B>,
}

impl<B: Barrier> BarrierBuilder<B> {
    /// Creates a builder with no participants and the default wait policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            participants: 0,
            wait_policy: WaitPolicy::default(),
            _barrier: PhantomData,
        }
    }

    /// Sets the number of participants.
    #[must_use]
    pub fn participants(mut self, count: usize) -> Self {
        self.participants = count;
        self
    }

    /// Sets the wait policy used by every wait inside the barrier.
    #[must_use]
    pub fn wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.wait_policy = policy;
        self
    }

    /// Allocates and wires all shared state of the barrier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoParticipants`] if the participant count is zero.
    pub fn build(self) -> Result<Arc<B>> {
        let participants = NonZero::new(self.participants).ok_or(Error::NoParticipants)?;

        let config = Config::new(participants).with_wait_policy(self.wait_policy);

        Ok(Arc::new(B::with_config(config)))
    }
}

impl<B: Barrier> Default for BarrierBuilder<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> fmt::Debug for BarrierBuilder<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BarrierBuilder")
            .field("participants", &self.participants)
            .field("wait_policy", &self.wait_policy)
            .finish_non_exhaustive()
    }
}

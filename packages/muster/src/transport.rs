//! Point-to-point signal delivery for the message-passing barriers.
//!
//! [`DisseminationBarrier`][crate::DisseminationBarrier] and
//! [`TournamentBarrier`][crate::TournamentBarrier] never touch shared state directly. All they
//! do is deliver a one-bit signal ("your flag is now `sense`") to a named slot of a named
//! partner and wait for signals delivered to their own slots. A [`Transport`] is whatever
//! carries those signals.
//!
//! Each slot has exactly one designated writer per generation, guaranteed by the barrier
//! topology. Transports therefore need no ordering across different sender/receiver pairs and
//! no locking on the signal path.

mod channels;
mod flags;

use std::fmt;
use std::num::NonZero;

pub use channels::*;
pub use flags::*;

use crate::WaitPolicy;

/// The location of one flag: a slot owned by a participant.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Address {
    participant: usize,
    slot: usize,
}

impl Address {
    /// Creates the address of `slot` owned by `participant`.
    #[must_use]
    pub const fn new(participant: usize, slot: usize) -> Self {
        Self { participant, slot }
    }

    /// The participant that owns the flag and is the only one that waits on it.
    #[must_use]
    pub const fn participant(&self) -> usize {
        self.participant
    }

    /// Which of the owner's flags this is.
    #[must_use]
    pub const fn slot(&self) -> usize {
        self.slot
    }
}

/// Carries one-bit signals between the participants of a barrier.
///
/// A transport connects a fixed set of participants, each owning a fixed number of flags that
/// all start out `false`.
pub trait Transport: fmt::Debug + Send + Sync + Sized + 'static {
    /// Connects `participants` participants, each owning `slots` flags.
    fn connect(participants: NonZero<usize>, slots: usize) -> Self;

    /// Sets the flag at `to` to `sense`.
    ///
    /// Only the designated writer of the flag may call this.
    fn signal(&self, to: Address, sense: bool);

    /// Waits until the flag at `at` equals `sense`.
    ///
    /// Only the owner of the flag may call this. Returns the number of unsuccessful polls.
    fn wait(&self, at: Address, sense: bool, policy: WaitPolicy) -> u64;
}

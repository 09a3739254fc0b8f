use std::num::NonZero;
use std::sync::Arc;

use tracing::debug;

use crate::topology::{ceil_log2, dissemination_partner};
use crate::transport::{Address, FlagTransport, Transport};
use crate::{Barrier, BarrierBuilder, Config, LocalState, Participant, Registry, Result};

/// The dissemination barrier.
///
/// In round `k` of `ceil(log2(P))` rounds, participant `i` signals participant
/// `(i + 2^k) mod P` and waits for the signal from participant `(i - 2^k) mod P`. After the
/// last round, every participant has transitively heard from every other participant.
///
/// There is no tree and no special participant: every participant does exactly one signal and
/// one wait per round, regardless of the participant count or the order of arrival. The
/// participant count does not need to be a power of two.
///
/// Two flag sets are used in alternating generations (the parity), so that a fast participant
/// that has already moved on to the next generation cannot overwrite a flag that a slow
/// partner has not yet observed.
///
/// Signals are delivered through a [`Transport`], by default a [`FlagTransport`].
///
/// # Example
///
/// ```
/// use std::thread;
///
/// use muster::{Barrier, DisseminationBarrier, Participant};
/// use new_zealand::nz;
///
/// let barrier = DisseminationBarrier::new(nz!(5));
/// assert_eq!(barrier.rounds(), 3);
/// assert_eq!(barrier.partner(4, 1), Some(1));
///
/// let threads = (0..5)
///     .map(|index| barrier.participant(index).unwrap())
///     .map(|mut participant| thread::spawn(move || participant.arrive_and_wait()))
///     .collect::<Vec<_>>();
///
/// for thread in threads {
///     thread.join().unwrap();
/// }
/// ```
#[derive(Debug)]
pub struct DisseminationBarrier<T: Transport = FlagTransport> {
    config: Config,
    rounds: u32,

    // partners[id * rounds + round]
    partners: Box<[usize]>,

    transport: T,
    registry: Registry,
}

impl DisseminationBarrier {
    /// Creates a builder for a barrier that uses the default [`FlagTransport`].
    ///
    /// Use [`BarrierBuilder::new()`] to build a barrier with a different transport.
    #[must_use]
    pub fn builder() -> BarrierBuilder<Self> {
        BarrierBuilder::new()
    }

    /// Creates a barrier for `participants` participants with the default configuration.
    #[must_use]
    pub fn new(participants: NonZero<usize>) -> Arc<Self> {
        Arc::new(Self::with_config(Config::new(participants)))
    }
}

impl<T: Transport> DisseminationBarrier<T> {
    /// The number of signaling rounds per generation, `ceil(log2(participants))`.
    #[must_use]
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// The participant that `id` signals in `round`, or `None` if either is out of range.
    #[must_use]
    pub fn partner(&self, id: usize, round: u32) -> Option<usize> {
        if round >= self.rounds {
            return None;
        }

        id.checked_mul(self.rounds as usize)
            .and_then(|row| row.checked_add(round as usize))
            .and_then(|index| self.partners.get(index))
            .copied()
    }

    // Flags of parity 0 come first, then flags of parity 1.
    fn slot(&self, parity: usize, round: u32) -> usize {
        #[expect(
            clippy::arithmetic_side_effects,
            reason = "parity is 0 or 1 and round is below rounds, so this is below 2 * rounds"
        )]
        let slot = parity * self.rounds as usize + round as usize;

        slot
    }

    fn arrive(&self, index: usize, local: &mut LocalState) -> u64 {
        let policy = self.config.wait_policy();
        let mut polls: u64 = 0;

        for round in 0..self.rounds {
            let slot = self.slot(local.parity, round);
            let partner = self
                .partner(index, round)
                .expect("participant index and round are always in range here");

            self.transport
                .signal(Address::new(partner, slot), local.sense);

            polls = polls.saturating_add(self.transport.wait(
                Address::new(index, slot),
                local.sense,
                policy,
            ));
        }

        // Parity 0 and parity 1 generations share a sense value; it only flips after both
        // flag sets have been used with it.
        if local.parity == 1 {
            local.sense = !local.sense;
        }

        local.parity ^= 1;

        polls
    }
}

impl<T: Transport> Barrier for DisseminationBarrier<T> {
    type Participant = DisseminationParticipant<T>;

    fn with_config(config: Config) -> Self {
        let participants = config.participants();
        let rounds = ceil_log2(participants);

        let partners = (0..participants.get())
            .flat_map(|id| {
                (0..rounds).map(move |round| dissemination_partner(id, round, participants))
            })
            .collect();

        let slots = (rounds as usize)
            .checked_mul(2)
            .expect("round count is at most the bit width of usize");

        debug!(
            algorithm = "dissemination",
            participants = participants.get(),
            rounds,
            "barrier initialized"
        );

        Self {
            config,
            rounds,
            partners,
            transport: T::connect(participants, slots),
            registry: Registry::new(participants, LocalState::with_sense(true)),
        }
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn participant(self: &Arc<Self>, index: usize) -> Result<DisseminationParticipant<T>> {
        let local = self.registry.claim(index)?;

        Ok(DisseminationParticipant {
            barrier: Arc::clone(self),
            index,
            local,
        })
    }
}

/// A participant in a [`DisseminationBarrier`].
#[derive(Debug)]
pub struct DisseminationParticipant<T: Transport = FlagTransport> {
    barrier: Arc<DisseminationBarrier<T>>,
    index: usize,
    local: LocalState,
}

impl<T: Transport> Participant for DisseminationParticipant<T> {
    fn index(&self) -> usize {
        self.index
    }

    fn generation(&self) -> u64 {
        self.local.generation
    }

    fn arrive_and_wait(&mut self) {
        let polls = self.barrier.arrive(self.index, &mut self.local);
        self.local.finish_generation(self.index, polls);
    }
}

impl<T: Transport> Drop for DisseminationParticipant<T> {
    fn drop(&mut self) {
        self.barrier.registry.release(self.index, self.local);
    }
}

use std::num::NonZero;
use std::sync::Arc;

use tracing::debug;

use crate::topology::{Role, ceil_log2, tournament_opponent, tournament_role};
use crate::transport::{Address, FlagTransport, Transport};
use crate::{Barrier, BarrierBuilder, Config, LocalState, Participant, Registry, Result};

#[derive(Clone, Copy, Debug)]
struct RoundEntry {
    role: Role,
    opponent: Option<usize>,
}

/// The tournament barrier.
///
/// Participants play a static single-elimination tournament. On the way up, the loser of each
/// match signals the winner and waits; the winner advances to the next round. Participant 0
/// always ends up as the champion. Once the champion has heard from its last opponent, the
/// wakeup descends the same bracket: every winner wakes the loser it beat, from the top round
/// down.
///
/// Like the dissemination barrier, this takes `ceil(log2(P))` rounds, but each participant
/// waits for at most one signal per phase instead of one per round.
///
/// The flag of participant `i` in round `k` is slot `k` of `i` in the [`Transport`]. Winners'
/// flags are written by their losers on the way up and losers' flags by their winners on the
/// way down, so every flag has exactly one writer.
///
/// # Example
///
/// ```
/// use std::thread;
///
/// use muster::topology::Role;
/// use muster::{Barrier, Participant, TournamentBarrier};
/// use new_zealand::nz;
///
/// let barrier = TournamentBarrier::new(nz!(3));
/// assert_eq!(barrier.role(0, 2), Some(Role::Champion));
/// assert_eq!(barrier.opponent(0, 2), Some(2));
///
/// let threads = (0..3)
///     .map(|index| barrier.participant(index).unwrap())
///     .map(|mut participant| thread::spawn(move || participant.arrive_and_wait()))
///     .collect::<Vec<_>>();
///
/// for thread in threads {
///     thread.join().unwrap();
/// }
/// ```
#[derive(Debug)]
pub struct TournamentBarrier<T: Transport = FlagTransport> {
    config: Config,
    rounds: u32,

    // table[id * (rounds + 1) + round], round 0 included.
    table: Box<[RoundEntry]>,

    transport: T,
    registry: Registry,
}

impl TournamentBarrier {
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

impl<T: Transport> TournamentBarrier<T> {
    /// The number of rounds in the tournament, `ceil(log2(participants))`.
    #[must_use]
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// The role of participant `id` in `round`, or `None` if either is out of range.
    ///
    /// Valid rounds are `0..=rounds()`; round 0 is always [`Role::Dropout`].
    #[must_use]
    pub fn role(&self, id: usize, round: u32) -> Option<Role> {
        self.entry(id, round).map(|entry| entry.role)
    }

    /// The participant whose flag `id` writes in `round`, if any.
    #[must_use]
    pub fn opponent(&self, id: usize, round: u32) -> Option<usize> {
        self.entry(id, round).and_then(|entry| entry.opponent)
    }

    fn entry(&self, id: usize, round: u32) -> Option<&RoundEntry> {
        if round > self.rounds {
            return None;
        }

        let columns = (self.rounds as usize).checked_add(1)?;

        id.checked_mul(columns)
            .and_then(|row| row.checked_add(round as usize))
            .and_then(|index| self.table.get(index))
    }

    fn entry_at(&self, id: usize, round: u32) -> RoundEntry {
        *self
            .entry(id, round)
            .expect("the bracket never leads a participant outside the role table")
    }

    fn signal_opponent(&self, entry: RoundEntry, round: u32, sense: bool) {
        let opponent = entry
            .opponent
            .expect("winners, losers and the champion always have an opponent");

        self.transport
            .signal(Address::new(opponent, round as usize), sense);
    }

    fn wait_own(&self, index: usize, round: u32, sense: bool) -> u64 {
        self.transport.wait(
            Address::new(index, round as usize),
            sense,
            self.config.wait_policy(),
        )
    }

    fn arrive(&self, index: usize, local: &mut LocalState) -> u64 {
        let sense = local.sense;
        let mut polls: u64 = 0;

        // With a single participant there is no bracket at all.
        if self.rounds > 0 {
            let mut round: u32 = 1;

            // Arrival: climb until eliminated or crowned.
            loop {
                let entry = self.entry_at(index, round);

                match entry.role {
                    Role::Loser => {
                        self.signal_opponent(entry, round, sense);
                        polls = polls.saturating_add(self.wait_own(index, round, sense));
                        break;
                    }
                    Role::Winner => {
                        polls = polls.saturating_add(self.wait_own(index, round, sense));
                    }
                    Role::Bye => {}
                    Role::Champion => {
                        polls = polls.saturating_add(self.wait_own(index, round, sense));
                        self.signal_opponent(entry, round, sense);
                        break;
                    }
                    Role::Dropout | Role::Unused => unreachable!(
                        "participant {index} reached role {:?} in round {round} during arrival",
                        entry.role
                    ),
                }

                round = round
                    .checked_add(1)
                    .expect("arrival always ends at or before the final round");
            }

            // Wakeup: descend the bracket, waking every loser beaten on the way up.
            loop {
                round = round
                    .checked_sub(1)
                    .expect("wakeup always ends at the round 0 dropout");

                let entry = self.entry_at(index, round);

                match entry.role {
                    Role::Winner => self.signal_opponent(entry, round, sense),
                    Role::Bye => {}
                    Role::Dropout => break,
                    Role::Loser | Role::Champion | Role::Unused => unreachable!(
                        "participant {index} reached role {:?} in round {round} during wakeup",
                        entry.role
                    ),
                }
            }
        }

        local.sense = !sense;

        polls
    }
}

impl<T: Transport> Barrier for TournamentBarrier<T> {
    type Participant = TournamentParticipant<T>;

    fn with_config(config: Config) -> Self {
        let participants = config.participants();
        let rounds = ceil_log2(participants);

        let table = (0..participants.get())
            .flat_map(|id| {
                (0..=rounds).map(move |round| RoundEntry {
                    role: tournament_role(id, round, participants),
                    opponent: tournament_opponent(id, round, participants),
                })
            })
            .collect();

        let slots = (rounds as usize)
            .checked_add(1)
            .expect("round count is at most the bit width of usize");

        debug!(
            algorithm = "tournament",
            participants = participants.get(),
            rounds,
            "barrier initialized"
        );

        Self {
            config,
            rounds,
            table,
            transport: T::connect(participants, slots),
            registry: Registry::new(participants, LocalState::with_sense(true)),
        }
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn participant(self: &Arc<Self>, index: usize) -> Result<TournamentParticipant<T>> {
        let local = self.registry.claim(index)?;

        Ok(TournamentParticipant {
            barrier: Arc::clone(self),
            index,
            local,
        })
    }
}

/// A participant in a [`TournamentBarrier`].
#[derive(Debug)]
pub struct TournamentParticipant<T: Transport = FlagTransport> {
    barrier: Arc<TournamentBarrier<T>>,
    index: usize,
    local: LocalState,
}

impl<T: Transport> Participant for TournamentParticipant<T> {
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

impl<T: Transport> Drop for TournamentParticipant<T> {
    fn drop(&mut self) {
        self.barrier.registry.release(self.index, self.local);
    }
}

use std::iter;
use std::num::NonZero;

use parking_lot::Mutex;
use tracing::trace;

use crate::{Error, Result, metrics};

/// The private state of one participant.
///
/// Only the live handle of that participant ever reads or writes it. While no handle is alive,
/// it is parked in the [`Registry`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct LocalState {
    pub(crate) sense: bool,

    /// Which of the two flag sets the next generation uses. Always 0 or 1.
    pub(crate) parity: usize,

    pub(crate) generation: u64,
}

impl LocalState {
    pub(crate) const fn with_sense(sense: bool) -> Self {
        Self {
            sense,
            parity: 0,
            generation: 0,
        }
    }

    pub(crate) fn finish_generation(&mut self, index: usize, polls: u64) {
        self.generation = self.generation.wrapping_add(1);

        metrics::record_generation(polls);
        trace!(index, generation = self.generation, polls, "released");
    }
}

/// Hands out the private state of each participant to at most one handle at a time.
#[derive(Debug)]
pub(crate) struct Registry {
    // None while a handle owns the state.
    seats: Box<[Mutex<Option<LocalState>>]>,
}

impl Registry {
    pub(crate) fn new(participants: NonZero<usize>, initial: LocalState) -> Self {
        let seats = iter::repeat_with(|| Mutex::new(Some(initial)))
            .take(participants.get())
            .collect();

        Self { seats }
    }

    pub(crate) fn claim(&self, index: usize) -> Result<LocalState> {
        let seat = self
            .seats
            .get(index)
            .ok_or(Error::ParticipantOutOfRange {
                index,
                participants: self.seats.len(),
            })?;

        let state = seat
            .lock()
            .take()
            .ok_or(Error::ParticipantClaimed { index })?;

        trace!(index, generation = state.generation, "participant claimed");

        Ok(state)
    }

    pub(crate) fn release(&self, index: usize, state: LocalState) {
        let seat = self
            .seats
            .get(index)
            .expect("index was validated when the participant was claimed");

        let previous = seat.lock().replace(state);
        debug_assert!(
            previous.is_none(),
            "participant {index} was released without being claimed"
        );

        trace!(index, generation = state.generation, "participant released");
    }
}

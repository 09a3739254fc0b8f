use std::iter;
use std::num::NonZero;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::transport::{Address, Transport};
use crate::{WaitPolicy, wait_until};

/// Delivers signals by writing directly into an arena of atomic flags.
///
/// All flags of all participants live in one contiguous table, with each participant's flags
/// adjacent to each other. Signaling is a release store into the partner's flag and waiting is
/// an acquire-load spin on the participant's own flag, so every participant only ever spins on
/// memory that it alone reads.
#[derive(Debug)]
pub struct FlagTransport {
    slots: usize,
    flags: Box<[AtomicBool]>,
}

impl FlagTransport {
    fn flag(&self, at: Address) -> &AtomicBool {
        debug_assert!(
            at.slot() < self.slots,
            "slot {} out of range for {} slots per participant",
            at.slot(),
            self.slots
        );

        at.participant()
            .checked_mul(self.slots)
            .and_then(|row| row.checked_add(at.slot()))
            .and_then(|index| self.flags.get(index))
            .expect("addresses are derived from the same topology the transport was sized for")
    }
}

impl Transport for FlagTransport {
    fn connect(participants: NonZero<usize>, slots: usize) -> Self {
        let count = participants
            .get()
            .checked_mul(slots)
            .expect("flag arena size must fit in the address space");

        let flags = iter::repeat_with(|| AtomicBool::new(false))
            .take(count)
            .collect();

        Self { slots, flags }
    }

    fn signal(&self, to: Address, sense: bool) {
        // Release: everything the signaling participant did before arriving must be visible
        // to the participant that observes the flag.
        self.flag(to).store(sense, Ordering::Release);
    }

    fn wait(&self, at: Address, sense: bool, policy: WaitPolicy) -> u64 {
        let flag = self.flag(at);

        wait_until(policy, || flag.load(Ordering::Acquire) == sense)
    }
}

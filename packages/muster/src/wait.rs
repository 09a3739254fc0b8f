use std::hint::spin_loop;
use std::thread;

use crate::WaitPolicy;

/// Polls `done` until it returns `true`.
///
/// Returns the number of polls that came back `false`, so zero means the condition was already
/// satisfied on entry.
#[cfg_attr(test, mutants::skip)] // Mutations turn this into an infinite loop.
#[inline]
pub(crate) fn wait_until(policy: WaitPolicy, mut done: impl FnMut() -> bool) -> u64 {
    let mut polls: u64 = 0;

    while !done() {
        polls = polls.wrapping_add(1);

        match policy {
            WaitPolicy::Spin => spin_loop(),
            WaitPolicy::SpinThenYield { spins } => {
                if polls < u64::from(spins.get()) {
                    spin_loop();
                } else {
                    thread::yield_now();
                }
            }
        }
    }

    polls
}

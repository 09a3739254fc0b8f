#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Collective synchronization barriers for a fixed set of participants.
//!
//! A barrier lets P participants repeatedly rendezvous: no participant returns from
//! [`Participant::arrive_and_wait()`] for a generation until all P participants have called it
//! for that same generation. Each barrier instance can be reused for any number of consecutive
//! generations.
//!
//! This package implements four classic algorithms with different scalability and locality
//! trade-offs:
//!
//! * [`CentralBarrier`] - sense-reversing barrier with one shared counter and one shared flag.
//!   Simple, but all participants contend on the same cache line.
//! * [`TreeBarrier`] - the MCS tree barrier: a 4-ary arrival tree and a 2-ary wakeup tree
//!   embedded in one node array. Every participant spins only on flags that nobody else spins on.
//! * [`DisseminationBarrier`] - `ceil(log2(P))` rounds of pairwise signaling, where in round `k`
//!   participant `i` signals participant `(i + 2^k) mod P`.
//! * [`TournamentBarrier`] - a static single-elimination bracket in which losers report to
//!   winners on the way up and winners wake losers on the way down.
//!
//! The first two are shared-memory algorithms. The last two only ever deliver a one-bit signal
//! to a named partner, so they are generic over a [`Transport`]: [`FlagTransport`] delivers
//! signals through an arena of atomic flags, [`ChannelTransport`] delivers them as messages.
//!
//! # Example
//!
//! ```
//! use std::thread;
//!
//! use muster::{Barrier, CentralBarrier, Participant};
//! use new_zealand::nz;
//!
//! let barrier = CentralBarrier::new(nz!(4));
//!
//! let threads = (0..4)
//!     .map(|index| {
//!         let mut participant = barrier.participant(index).unwrap();
//!
//!         thread::spawn(move || {
//!             for _ in 0..10 {
//!                 participant.arrive_and_wait();
//!             }
//!
//!             participant.generation()
//!         })
//!     })
//!     .collect::<Vec<_>>();
//!
//! for thread in threads {
//!     assert_eq!(thread.join().unwrap(), 10);
//! }
//! ```
//!
//! # Participants
//!
//! A barrier hands out exactly one live [`Participant`] handle per index in `0..P`. The handle
//! owns that participant's private state (sense and parity). Dropping the handle returns the
//! state to the barrier, so the same index can be claimed again later and continue where the
//! previous handle left off.
//!
//! # Liveness
//!
//! There is no timeout and no cancellation. If a participant never arrives, every other
//! participant waits forever for it.

mod barrier;
mod central;
mod config;
mod dissemination;
mod error;
mod metrics;
mod registry;
pub mod topology;
mod tournament;
pub mod transport;
mod tree;
mod wait;

pub use barrier::*;
pub use central::*;
pub use config::*;
pub use dissemination::*;
pub use error::*;
pub(crate) use registry::*;
pub use tournament::*;
pub use transport::{ChannelTransport, FlagTransport, Transport};
pub use tree::*;
pub(crate) use wait::*;

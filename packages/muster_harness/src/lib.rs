#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A command-line harness that drives a [`muster`] barrier with one thread per participant.
//!
//! Every thread calls `arrive_and_wait()` once per generation. Before arriving, it bumps a
//! shared arrival counter; after being released, it checks that the counter proves every
//! participant arrived for that generation and that nobody has run more than one generation
//! ahead. Any violation aborts the run with [`RunError::ReleaseViolation`].
//!
//! The core logic is exposed via the [`run`] function. The binary entry point is in `main.rs`.

mod types;

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

use muster::{
    Barrier, BarrierBuilder, CentralBarrier, ChannelTransport, DisseminationBarrier,
    FlagTransport, Participant, TournamentBarrier, TreeBarrier,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
pub use types::*;

/// Core logic of the tool, extracted for testability.
///
/// Builds the requested barrier, runs every participant on its own thread for the requested
/// number of generations and finalizes the barrier afterwards.
#[doc(hidden)]
pub fn run(input: &RunInput) -> Result<RunOutcome, RunError> {
    if !input.algorithm.uses_transport() && input.transport != TransportKind::Flags {
        return Err(RunError::TransportNotSupported {
            algorithm: input.algorithm,
            transport: input.transport,
        });
    }

    info!(
        algorithm = %input.algorithm,
        transport = %input.transport,
        participants = input.participants,
        generations = input.generations,
        "starting run"
    );

    let outcome = match (input.algorithm, input.transport) {
        (Algorithm::Central, _) => drive::<CentralBarrier>(input),
        (Algorithm::Tree, _) => drive::<TreeBarrier>(input),
        (Algorithm::Dissemination, TransportKind::Flags) => {
            drive::<DisseminationBarrier<FlagTransport>>(input)
        }
        (Algorithm::Dissemination, TransportKind::Channels) => {
            drive::<DisseminationBarrier<ChannelTransport>>(input)
        }
        (Algorithm::Tournament, TransportKind::Flags) => {
            drive::<TournamentBarrier<FlagTransport>>(input)
        }
        (Algorithm::Tournament, TransportKind::Channels) => {
            drive::<TournamentBarrier<ChannelTransport>>(input)
        }
    }?;

    info!(
        elapsed = ?outcome.elapsed,
        mean_generation_time = ?outcome.mean_generation_time(),
        "run completed"
    );

    Ok(outcome)
}

fn drive<B: Barrier>(input: &RunInput) -> Result<RunOutcome, RunError> {
    let barrier = BarrierBuilder::<B>::new()
        .participants(input.participants)
        .wait_policy(input.wait_policy)
        .build()?;

    let participants = barrier.participants().get();
    let participant_count =
        u64::try_from(participants).expect("participant count always fits in u64");

    // Claim every index up front so that a claim failure is reported before any thread waits.
    let handles = (0..participants)
        .map(|index| barrier.participant(index))
        .collect::<muster::Result<Vec<_>>>()?;

    let arrivals = AtomicU64::new(0);
    let first_violation = Mutex::new(None);
    let start = Instant::now();

    let panicked = thread::scope(|s| {
        let threads = handles
            .into_iter()
            .map(|participant| {
                let arrivals = &arrivals;
                let first_violation = &first_violation;

                s.spawn(move || {
                    drive_participant(
                        participant,
                        arrivals,
                        first_violation,
                        participant_count,
                        input.generations,
                    );
                })
            })
            .collect::<Vec<_>>();

        threads
            .into_iter()
            .enumerate()
            .filter_map(|(participant, thread)| thread.join().err().map(|_| participant))
            .min()
    });

    let elapsed = start.elapsed();

    if let Some(participant) = panicked {
        return Err(RunError::ParticipantPanicked { participant });
    }

    if let Some(violation) = first_violation.into_inner() {
        return Err(violation);
    }

    barrier.finalize()?;

    Ok(RunOutcome {
        participants,
        generations: input.generations,
        elapsed,
    })
}

// Runs all generations even after a violation was seen. Stopping early would leave the other
// participants waiting forever for an arrival that never comes.
fn drive_participant<P: Participant>(
    mut participant: P,
    arrivals: &AtomicU64,
    first_violation: &Mutex<Option<RunError>>,
    participants: u64,
    generations: u64,
) {
    for generation in 0..generations {
        arrivals.fetch_add(1, Ordering::SeqCst);
        participant.arrive_and_wait();

        let observed = arrivals.load(Ordering::SeqCst);

        // Everyone has arrived for this generation. Others may already have arrived for the
        // next one, but that generation cannot complete without us.
        let expected_min = generation.saturating_add(1).saturating_mul(participants);
        let expected_max = expected_min.saturating_add(participants).saturating_sub(1);

        if !(expected_min..=expected_max).contains(&observed) {
            warn!(
                index = participant.index(),
                generation, observed, expected_min, expected_max, "release violation"
            );

            let mut first_violation = first_violation.lock();

            if first_violation.is_none() {
                *first_violation = Some(RunError::ReleaseViolation {
                    participant: participant.index(),
                    generation,
                    observed,
                    expected_min,
                    expected_max,
                });
            }
        }
    }

    debug!(
        index = participant.index(),
        generations = participant.generation(),
        "participant finished"
    );
}

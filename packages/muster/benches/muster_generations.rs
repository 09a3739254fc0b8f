//! Compares the cost of one barrier generation across algorithms and participant counts.
//!
//! Every measured iteration is one full generation: all participants call `arrive_and_wait()`
//! once and the slowest participant's time is reported.

#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::num::NonZero;
use std::thread;
use std::time::{Duration, Instant};

use criterion::measurement::WallTime;
use criterion::{BenchmarkGroup, BenchmarkId, Criterion, criterion_group, criterion_main};
use muster::{
    Barrier, BarrierBuilder, CentralBarrier, ChannelTransport, DisseminationBarrier,
    FlagTransport, Participant, TournamentBarrier, TreeBarrier,
};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

fn entrypoint(c: &mut Criterion) {
    let available = thread::available_parallelism().map_or(1, NonZero::get);

    let mut participant_counts = vec![2, 4, available];
    participant_counts.retain(|&count| count <= available.max(2));
    participant_counts.sort_unstable();
    participant_counts.dedup();

    let mut group = c.benchmark_group("muster_generation");

    for participants in participant_counts {
        bench_one::<CentralBarrier>(&mut group, "central", participants);
        bench_one::<TreeBarrier>(&mut group, "tree", participants);
        bench_one::<DisseminationBarrier<FlagTransport>>(&mut group, "dissemination", participants);
        bench_one::<DisseminationBarrier<ChannelTransport>>(
            &mut group,
            "dissemination_channels",
            participants,
        );
        bench_one::<TournamentBarrier<FlagTransport>>(&mut group, "tournament", participants);
        bench_one::<TournamentBarrier<ChannelTransport>>(
            &mut group,
            "tournament_channels",
            participants,
        );
    }

    group.finish();
}

fn bench_one<B: Barrier>(
    group: &mut BenchmarkGroup<'_, WallTime>,
    name: &str,
    participants: usize,
) {
    group.bench_function(BenchmarkId::new(name, participants), |b| {
        b.iter_custom(|iters| black_box(measure_generations::<B>(participants, iters)));
    });
}

fn measure_generations<B: Barrier>(participants: usize, iterations: u64) -> Duration {
    let barrier = BarrierBuilder::<B>::new()
        .participants(participants)
        .build()
        .expect("participant count is never zero here");

    thread::scope(|s| {
        let threads = (0..participants)
            .map(|index| {
                let mut participant = barrier
                    .participant(index)
                    .expect("each index is claimed exactly once");

                s.spawn(move || {
                    // One unmeasured generation so that every thread is up and running before
                    // the clock starts.
                    participant.arrive_and_wait();

                    let start = Instant::now();

                    for _ in 0..iterations {
                        participant.arrive_and_wait();
                    }

                    start.elapsed()
                })
            })
            .collect::<Vec<_>>();

        threads
            .into_iter()
            .map(|thread| thread.join().expect("participant threads do not panic"))
            .max()
            .unwrap_or_default()
    })
}

//! Runs every barrier algorithm with a few threads and shows that no thread starts a phase of
//! work before every thread has finished the previous phase.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use muster::{
    Barrier, BarrierBuilder, CentralBarrier, ChannelTransport, DisseminationBarrier, Participant,
    TournamentBarrier, TreeBarrier,
};

const PARTICIPANTS: usize = 5;
const PHASES: usize = 3;

fn main() {
    run::<CentralBarrier>("central");
    run::<TreeBarrier>("tree");
    run::<DisseminationBarrier>("dissemination");
    run::<TournamentBarrier<ChannelTransport>>("tournament over channels");
}

fn run<B: Barrier>(name: &str) {
    let barrier = BarrierBuilder::<B>::new()
        .participants(PARTICIPANTS)
        .build()
        .unwrap();

    let finished_work = Arc::new(AtomicUsize::new(0));

    let threads = (0..PARTICIPANTS)
        .map(|index| {
            let mut participant = barrier.participant(index).unwrap();
            let finished_work = Arc::clone(&finished_work);

            thread::spawn(move || {
                for phase in 0..PHASES {
                    finished_work.fetch_add(1, Ordering::SeqCst);
                    participant.arrive_and_wait();

                    // Everyone has finished this phase, whatever order they arrived in.
                    let finished = finished_work.load(Ordering::SeqCst);
                    assert!(finished >= (phase + 1) * PARTICIPANTS);
                }
            })
        })
        .collect::<Vec<_>>();

    for thread in threads {
        thread.join().unwrap();
    }

    println!(
        "{name}: {PARTICIPANTS} participants completed {PHASES} phases ({} units of work)",
        finished_work.load(Ordering::SeqCst)
    );

    barrier.finalize().unwrap();
}

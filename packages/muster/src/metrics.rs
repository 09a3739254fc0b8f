//! Metrics for barrier generations.
//!
//! The events are per-thread, which fits the usage pattern well: every participant lives on
//! its own thread and records into its own event instance.

use nm::{Event, Magnitude};

/// Histogram buckets for the number of unsuccessful polls in one `arrive_and_wait()`.
///
/// Zero means the participant was the last to arrive everywhere it waited. Large values mean
/// the participant waited for a long time or for many rounds.
const WAIT_POLLS_BUCKETS: &[Magnitude] = &[0, 1, 10, 100, 1_000, 10_000, 100_000, 1_000_000];

thread_local! {
    /// Completed `arrive_and_wait()` calls, across all barriers and algorithms.
    static GENERATIONS: Event = Event::builder()
        .name("muster_generations")
        .build();

    /// Unsuccessful polls spent waiting inside one `arrive_and_wait()` call.
    static WAIT_POLLS: Event = Event::builder()
        .name("muster_wait_polls")
        .histogram(WAIT_POLLS_BUCKETS)
        .build();
}

pub(crate) fn record_generation(polls: u64) {
    GENERATIONS.with(|e| e.observe_once());
    WAIT_POLLS.with(|e| e.observe(polls));
}

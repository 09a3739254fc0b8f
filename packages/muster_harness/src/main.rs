#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

//! Binary entry point for the muster harness.
//!
//! This module is excluded from mutation testing because testing process entry/exit behavior
//! is impractical - it requires spawning subprocesses and checking exit codes.

use std::io;
use std::num::NonZero;
use std::process::ExitCode;

use argh::FromArgs;
use muster::WaitPolicy;
use muster_harness::{Algorithm, RunInput, TransportKind, run};
use nm::Report;
use tracing_subscriber::EnvFilter;

/// Runs a barrier algorithm with one thread per participant and verifies that no participant
/// is released before all participants have arrived.
#[derive(FromArgs)]
struct Args {
    /// barrier algorithm to run (central, tree, dissemination, tournament)
    #[argh(option)]
    algorithm: Algorithm,

    /// signal transport for dissemination and tournament (flags, channels)
    #[argh(option)]
    transport: Option<TransportKind>,

    /// number of participating threads
    #[argh(option, default = "4")]
    participants: usize,

    /// number of generations every participant completes
    #[argh(option, default = "10_000")]
    generations: u64,

    /// polls to spin through before yielding the processor; 0 spins forever
    #[argh(option, default = "128")]
    yield_after: u32,
}

// Binary entry point - mutations would require subprocess testing which is impractical.
#[cfg_attr(test, mutants::skip)]
fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Args = argh::from_env();

    let wait_policy = NonZero::new(args.yield_after)
        .map_or(WaitPolicy::Spin, |spins| WaitPolicy::SpinThenYield { spins });

    let input = RunInput {
        algorithm: args.algorithm,
        transport: args.transport.unwrap_or_default(),
        participants: args.participants,
        generations: args.generations,
        wait_policy,
    };

    match run(&input) {
        Ok(outcome) => {
            println!(
                "{} barrier: {} participants completed {} generations in {:?} ({:?} per generation)",
                input.algorithm,
                outcome.participants,
                outcome.generations,
                outcome.elapsed,
                outcome.mean_generation_time()
            );
            println!();
            println!("{}", Report::collect());

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

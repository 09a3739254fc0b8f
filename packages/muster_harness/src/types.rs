// Public API types for muster_harness.
//
// These types are used by main.rs and exposed via the crate's public API.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use muster::WaitPolicy;
use thiserror::Error;

/// Which barrier algorithm to drive.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Algorithm {
    /// Shared counter with a global sense flag.
    Central,
    /// MCS tree with 4-ary arrival and binary wakeup.
    Tree,
    /// Pairwise notification over `ceil(log2 P)` rounds.
    Dissemination,
    /// Statically paired bracket with a single champion.
    Tournament,
}

impl Algorithm {
    /// Whether this algorithm signals through a pluggable transport.
    #[must_use]
    pub fn uses_transport(self) -> bool {
        matches!(self, Self::Dissemination | Self::Tournament)
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "central" => Ok(Self::Central),
            "tree" => Ok(Self::Tree),
            "dissemination" => Ok(Self::Dissemination),
            "tournament" => Ok(Self::Tournament),
            _ => Err(format!(
                "Invalid algorithm: '{s}'. Valid options are: central, tree, dissemination, tournament"
            )),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Central => "central",
            Self::Tree => "tree",
            Self::Dissemination => "dissemination",
            Self::Tournament => "tournament",
        };

        f.write_str(name)
    }
}

/// How the message-passing algorithms deliver their signals.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum TransportKind {
    /// Shared arena of atomic flags.
    #[default]
    Flags,
    /// One channel inbox per participant.
    Channels,
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flags" => Ok(Self::Flags),
            "channels" => Ok(Self::Channels),
            _ => Err(format!(
                "Invalid transport: '{s}'. Valid options are: flags, channels"
            )),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Flags => "flags",
            Self::Channels => "channels",
        };

        f.write_str(name)
    }
}

/// Input parameters for the `run` function.
///
/// This is the parsed and validated input that the core logic operates on.
#[doc(hidden)]
#[derive(Clone, Copy, Debug)]
#[allow(
    clippy::exhaustive_structs,
    reason = "This is a hidden struct for internal/test use only"
)]
pub struct RunInput {
    /// The barrier algorithm to drive.
    pub algorithm: Algorithm,
    /// The transport used by dissemination and tournament barriers.
    pub transport: TransportKind,
    /// How many threads take part in the barrier.
    pub participants: usize,
    /// How many times every thread calls `arrive_and_wait()`.
    pub generations: u64,
    /// How waiting participants spend their time.
    pub wait_policy: WaitPolicy,
}

/// The outcome of a successful run.
#[doc(hidden)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(
    clippy::exhaustive_structs,
    reason = "This is a hidden struct for internal/test use only"
)]
pub struct RunOutcome {
    /// How many threads took part.
    pub participants: usize,
    /// How many generations every thread completed.
    pub generations: u64,
    /// Wall time from the first measured arrival to the last release.
    pub elapsed: Duration,
}

impl RunOutcome {
    /// Mean wall time of one generation, or zero if no generations were run.
    #[must_use]
    pub fn mean_generation_time(&self) -> Duration {
        if self.generations == 0 {
            return Duration::ZERO;
        }

        #[expect(
            clippy::cast_precision_loss,
            reason = "precision loss is acceptable for a mean in a report"
        )]
        let generations = self.generations as f64;

        self.elapsed.div_f64(generations)
    }
}

/// Errors that can occur during a run.
#[doc(hidden)]
#[derive(Debug, Error)]
#[allow(
    clippy::exhaustive_enums,
    reason = "This is a hidden enum for internal/test use only"
)]
pub enum RunError {
    /// The barrier rejected its configuration or a participant claim.
    #[error("barrier error: {0}")]
    Barrier(#[from] muster::Error),

    /// A transport was requested for an algorithm that does not use one.
    #[error("the {algorithm} barrier does not support the {transport} transport")]
    TransportNotSupported {
        /// The algorithm that was requested.
        algorithm: Algorithm,
        /// The transport that was requested.
        transport: TransportKind,
    },

    /// A participant observed a release that broke the barrier's guarantees.
    #[error(
        "participant {participant} was released from generation {generation} having seen {observed} arrivals, expected {expected_min}..={expected_max}"
    )]
    ReleaseViolation {
        /// The participant that observed the violation.
        participant: usize,
        /// The zero-based generation it had just been released from.
        generation: u64,
        /// How many arrivals in total it saw when released.
        observed: u64,
        /// The smallest arrival count that allows the release.
        expected_min: u64,
        /// The largest arrival count possible before this participant arrives again.
        expected_max: u64,
    },

    /// A participant thread panicked.
    #[error("participant {participant} panicked")]
    ParticipantPanicked {
        /// The index of the participant that panicked.
        participant: usize,
    },
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn algorithm_parsing() {
        assert_eq!("central".parse::<Algorithm>().unwrap(), Algorithm::Central);
        assert_eq!("TREE".parse::<Algorithm>().unwrap(), Algorithm::Tree);
        assert_eq!(
            "Dissemination".parse::<Algorithm>().unwrap(),
            Algorithm::Dissemination
        );
        assert_eq!(
            "tournament".parse::<Algorithm>().unwrap(),
            Algorithm::Tournament
        );

        let error = "butterfly".parse::<Algorithm>().unwrap_err();
        assert!(error.contains("butterfly"));
        assert!(error.contains("central, tree, dissemination, tournament"));
    }

    #[test]
    fn transport_parsing() {
        assert_eq!(
            "flags".parse::<TransportKind>().unwrap(),
            TransportKind::Flags
        );
        assert_eq!(
            "Channels".parse::<TransportKind>().unwrap(),
            TransportKind::Channels
        );
        assert!("pigeons".parse::<TransportKind>().is_err());
    }

    #[test]
    fn display_matches_parsing() {
        for algorithm in [
            Algorithm::Central,
            Algorithm::Tree,
            Algorithm::Dissemination,
            Algorithm::Tournament,
        ] {
            assert_eq!(
                algorithm.to_string().parse::<Algorithm>().unwrap(),
                algorithm
            );
        }

        for transport in [TransportKind::Flags, TransportKind::Channels] {
            assert_eq!(
                transport.to_string().parse::<TransportKind>().unwrap(),
                transport
            );
        }
    }

    #[test]
    fn only_message_passing_algorithms_use_transport() {
        assert!(!Algorithm::Central.uses_transport());
        assert!(!Algorithm::Tree.uses_transport());
        assert!(Algorithm::Dissemination.uses_transport());
        assert!(Algorithm::Tournament.uses_transport());
    }

    #[test]
    fn mean_generation_time() {
        let outcome = RunOutcome {
            participants: 4,
            generations: 4,
            elapsed: Duration::from_secs(10),
        };
        assert_eq!(outcome.mean_generation_time(), Duration::from_millis(2500));

        let empty = RunOutcome {
            participants: 4,
            generations: 0,
            elapsed: Duration::from_millis(50),
        };
        assert_eq!(empty.mean_generation_time(), Duration::ZERO);
    }
}

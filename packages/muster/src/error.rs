use thiserror::Error;

/// Errors that can occur when building, joining or finalizing a barrier.
///
/// All of these are precondition violations on the caller's side. None of them can be recovered
/// from by retrying the same call; the call sequence itself has to be fixed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A barrier was requested for zero participants.
    #[error("a barrier requires at least one participant")]
    NoParticipants,

    /// A participant index outside `0..participants` was requested.
    #[error("participant index {index} is out of range for a barrier of {participants} participants")]
    ParticipantOutOfRange {
        /// The index the caller asked for.
        index: usize,

        /// The number of participants the barrier was built for.
        participants: usize,
    },

    /// A handle for this participant index is already alive.
    ///
    /// Each participant index may be owned by at most one handle at a time, otherwise two callers
    /// would share one participant's private sense and parity.
    #[error("participant {index} is already claimed by a live handle")]
    ParticipantClaimed {
        /// The index the caller asked for.
        index: usize,
    },

    /// The barrier could not be finalized because other references to it are still alive.
    ///
    /// Participant handles keep the barrier alive, so they must all be dropped first.
    #[error("barrier cannot be finalized while {owners} other references to it are alive")]
    StillShared {
        /// How many other references (including participant handles) were alive.
        owners: usize,
    },
}

/// A specialized `Result` type for barrier operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

//! Errors of batched pipe environments.
use std::io;
use thiserror::Error;

/// Errors raised while driving game instances.
///
/// None of them is recovered from; the batch of instances should be closed.
#[derive(Error, Debug)]
pub enum EnvError {
    /// The bytes read do not follow the protocol (echo or sentinel mismatch,
    /// truncated reply).
    #[error("Protocol desync: {0}")]
    ProtocolDesync(String),

    /// Error on the pipes of an instance.
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// A worker did not finish the round in time.
    #[error("Worker {0} timed out")]
    WorkerTimeout(usize),

    /// A worker thread has ended.
    #[error("Worker {0} disconnected")]
    WorkerDisconnected(usize),

    /// The number of actions differs from the number of instances.
    #[error("Expected {expected} actions, got {got}")]
    ActionCountMismatch {
        /// The number of instances.
        expected: usize,
        /// The number of actions given.
        got: usize,
    },

    /// The previous round has not been collected with `get_state`.
    #[error("Previous round has not been collected")]
    RoundInFlight,

    /// `get_state` was called without a dispatched round.
    #[error("No round in flight")]
    NoRoundInFlight,

    /// An action was requested before the instance was reset.
    #[error("Action before reset")]
    NotReset,

    /// An earlier round failed; the environment only accepts `close`.
    #[error("Environment failed in an earlier round")]
    Failed,

    /// Failed to start a game instance.
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        /// The program.
        program: String,
        /// The cause.
        source: io::Error,
    },
}

impl From<io::Error> for EnvError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => Self::ProtocolDesync(format!("truncated read: {}", e)),
            _ => Self::Io(e),
        }
    }
}

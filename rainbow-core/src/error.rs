//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum RainbowError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// A call into an external collaborator (approximator, replay buffer) failed.
    ///
    /// Attached as context to the underlying error; the training loop does not
    /// recover from it.
    #[error("Collaborator failure: {0}")]
    CollaboratorFailure(&'static str),

    /// Arrays passed across a seam disagree in shape.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The replay buffer cannot produce a batch.
    #[error("Replay buffer is empty")]
    EmptyReplayBuffer,
}

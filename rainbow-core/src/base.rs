//! Core functionalities.
mod approximator;
mod batch;
mod batch_env;
mod replay_buffer;
pub use approximator::{Approximator, QValues, Target, TargetValues};
pub use batch::{PrioritySample, Round, SampledBatch, TransitionBatch};
pub use batch_env::BatchEnv;
pub use replay_buffer::ReplayBufferBase;

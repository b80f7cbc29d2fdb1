#![warn(missing_docs)]
//! Core traits and data types for training a Rainbow-style DQN agent
//! against a batch of concurrently running environments.
//!
//! The crate defines the seams between the three moving parts of the system:
//!
//! * [`BatchEnv`] - N environment instances stepped in lock-step rounds,
//! * [`Approximator`] - the Q-network, a numeric black box,
//! * [`ReplayBufferBase`] - storage and (prioritized) sampling of transitions.
//!
//! [`SimpleReplayBuffer`](replay_buffer::SimpleReplayBuffer) is a reference
//! implementation of the replay buffer interface.
pub mod error;
pub mod record;
pub mod replay_buffer;

mod base;
pub use base::{
    Approximator, BatchEnv, PrioritySample, QValues, ReplayBufferBase, Round, SampledBatch,
    Target, TargetValues, TransitionBatch,
};

mod scheduler;
pub use scheduler::LinearScheduler;

mod support;
pub use support::{CategoricalConfig, CategoricalSupport};

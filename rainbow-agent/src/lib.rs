//! Rainbow-style DQN agent.
//!
//! [`Dqn`] drives a [`BatchEnv`](rainbow_core::BatchEnv), stores multi-step
//! transitions in a [`ReplayBufferBase`](rainbow_core::ReplayBufferBase) and
//! trains an [`Approximator`](rainbow_core::Approximator) towards scalar or
//! categorical (distributional) double-Q targets. [`Trainer`] runs the outer
//! loop: burn-in, then alternating evaluation and training.
pub mod dqn;
pub mod trainer;
pub use dqn::{fixed_samples, Dqn, DqnConfig, EpsilonGreedy};
pub use trainer::{Trainer, TrainerConfig};

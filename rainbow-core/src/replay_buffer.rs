//! A reference replay buffer.
//!
//! [`SimpleReplayBuffer`] samples transitions uniformly, or proportionally to
//! their priorities when built with a [`PerConfig`].
mod base;
mod config;
mod sum_tree;
pub use base::SimpleReplayBuffer;
pub use config::{PerConfig, SimpleReplayBufferConfig};

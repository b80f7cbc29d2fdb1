//! DQN agent.
mod base;
mod config;
mod explorer;
mod fixed_samples;
pub mod target;
pub use base::Dqn;
pub use config::DqnConfig;
pub use explorer::EpsilonGreedy;
pub use fixed_samples::fixed_samples;

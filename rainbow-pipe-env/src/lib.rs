//! Batched environment over game instances speaking a byte protocol on
//! stdin/stdout.
//!
//! Each game instance is a subprocess. A [`Connector`] drives one instance
//! synchronously: it writes a command byte and parses the reply. A worker
//! thread owns one connector, and [`PipeBatchEnv`] steps N workers in
//! lock-step rounds, exposing them as a [`rainbow_core::BatchEnv`].
//!
//! ```no_run
//! use anyhow::Result;
//! use rainbow_core::BatchEnv;
//! use rainbow_pipe_env::{PipeBatchEnv, PipeEnvConfig};
//!
//! fn main() -> Result<()> {
//!     let config = PipeEnvConfig::default().program("./game").n_procs(3);
//!     let mut env = PipeBatchEnv::build(&config)?;
//!
//!     env.reset()?;
//!     let round = env.get_state()?;
//!     assert_eq!(round.len(), 3);
//!
//!     env.take_action(&[0, 1, 2])?;
//!     let round = env.get_state()?;
//!     println!("{:?}", round.reward);
//!
//!     env.close()?;
//!     Ok(())
//! }
//! ```
mod batch_env;
mod config;
mod connector;
mod error;
pub mod scripted;
mod worker;

pub use batch_env::PipeBatchEnv;
pub use config::{FrameLayout, PipeEnvConfig};
pub use connector::{
    Connector, KillSwitch, ProcessConnector, StepReply, WireConnector, RESET_BYTE, SENTINEL_BYTE,
    TERMINATE_BYTE,
};
pub use error::EnvError;

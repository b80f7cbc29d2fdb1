//! Protocol adapters of game instances.
//!
//! A game instance reads one command byte at a time and replies:
//!
//! | command | reply |
//! |---|---|
//! | [`RESET_BYTE`] | the same byte, then a frame |
//! | action code | reward and terminal flag (`i32`, little endian), then a frame |
//! | [`TERMINATE_BYTE`] | none, the instance exits |
//!
//! A frame is [`FrameLayout::len`](crate::FrameLayout::len) bytes followed by
//! [`SENTINEL_BYTE`].
mod process;
mod wire;
use crate::EnvError;
use std::fmt;
pub use process::ProcessConnector;
pub use wire::WireConnector;

/// Starts a new episode.
pub const RESET_BYTE: u8 = b'@';

/// Asks the instance to exit.
pub const TERMINATE_BYTE: u8 = b'Q';

/// Terminates every frame.
pub const SENTINEL_BYTE: u8 = b'.';

/// Reply to an action.
#[derive(Clone, Debug, PartialEq)]
pub struct StepReply {
    /// Observation after the action.
    pub obs: Vec<u8>,

    /// Raw reward.
    pub reward: i32,

    /// `true` if the episode has ended.
    pub is_terminal: bool,
}

/// Terminates a game instance from outside the thread driving it.
///
/// A worker blocked on the instance's I/O returns once the instance is gone.
pub struct KillSwitch(Box<dyn Fn() + Send + Sync>);

impl KillSwitch {
    /// Wraps the function killing the instance.
    pub fn new(kill: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Box::new(kill))
    }

    /// Kills the instance. Killing it twice is harmless.
    pub fn kill(&self) {
        (self.0)()
    }
}

impl fmt::Debug for KillSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KillSwitch")
    }
}

/// Drives one game instance, one request at a time.
pub trait Connector: Send {
    /// Starts a new episode and returns its first observation.
    fn reset(&mut self) -> Result<Vec<u8>, EnvError>;

    /// Applies an action.
    fn step(&mut self, action: u8) -> Result<StepReply, EnvError>;

    /// The most recent observation, `None` before the first reset.
    fn current(&self) -> Option<&[u8]>;

    /// Asks the instance to exit.
    fn close(&mut self) -> Result<(), EnvError>;

    /// A handle killing the instance while a request is pending, `None` if
    /// the instance cannot be interrupted.
    fn kill_switch(&self) -> Option<KillSwitch> {
        None
    }
}

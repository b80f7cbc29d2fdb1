//! Configuration of [`PipeBatchEnv`](crate::PipeBatchEnv).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
    time::Duration,
};

/// Layout of an observation frame.
///
/// A frame is `layers * height * width` spatial bytes, row-major, followed by
/// `n_aux` auxiliary bytes. On the wire it is terminated by
/// [`SENTINEL_BYTE`](crate::SENTINEL_BYTE), which is not part of the observation.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
pub struct FrameLayout {
    /// The number of spatial layers.
    pub layers: usize,

    /// Height of a layer.
    pub height: usize,

    /// Width of a layer.
    pub width: usize,

    /// The number of auxiliary bytes.
    pub n_aux: usize,
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self {
            layers: 11,
            height: 13,
            width: 13,
            n_aux: 4,
        }
    }
}

impl FrameLayout {
    /// Creates a layout.
    pub fn new(layers: usize, height: usize, width: usize, n_aux: usize) -> Self {
        Self {
            layers,
            height,
            width,
            n_aux,
        }
    }

    /// Bytes of the spatial part.
    pub fn spatial_len(&self) -> usize {
        self.layers * self.height * self.width
    }

    /// Bytes of an observation, the sentinel excluded.
    pub fn len(&self) -> usize {
        self.spatial_len() + self.n_aux
    }

    /// Returns `true` if an observation has no byte.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Configuration of [`PipeBatchEnv`](crate::PipeBatchEnv).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PipeEnvConfig {
    /// Game program spawned for each instance.
    pub program: String,

    /// Arguments passed to the program.
    pub args: Vec<String>,

    /// The number of instances.
    pub n_procs: usize,

    /// Layout of observation frames.
    pub layout: FrameLayout,

    /// Episodes are cut once their step counter exceeds this value.
    pub max_episode_length: usize,

    /// Bound on the wait for each worker in `get_state`, in milliseconds.
    /// Waits forever if `None`.
    pub round_timeout_ms: Option<u64>,

    /// Bound on the wait for each worker thread to stop in `close`, in
    /// milliseconds. A worker still running after it is left detached.
    pub close_timeout_ms: u64,
}

impl Default for PipeEnvConfig {
    fn default() -> Self {
        Self {
            program: "".to_string(),
            args: vec![],
            n_procs: 1,
            layout: FrameLayout::default(),
            max_episode_length: 100_000,
            round_timeout_ms: None,
            close_timeout_ms: 5000,
        }
    }
}

impl PipeEnvConfig {
    /// Sets the game program.
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Sets the arguments of the game program.
    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Sets the number of instances.
    pub fn n_procs(mut self, v: usize) -> Self {
        self.n_procs = v;
        self
    }

    /// Sets the frame layout.
    pub fn layout(mut self, layout: FrameLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Sets the maximum episode length.
    pub fn max_episode_length(mut self, v: usize) -> Self {
        self.max_episode_length = v;
        self
    }

    /// Sets the timeout of a round in milliseconds.
    pub fn round_timeout_ms(mut self, v: Option<u64>) -> Self {
        self.round_timeout_ms = v;
        self
    }

    /// Sets the timeout of `close` in milliseconds.
    pub fn close_timeout_ms(mut self, v: u64) -> Self {
        self.close_timeout_ms = v;
        self
    }

    pub(crate) fn round_timeout(&self) -> Option<Duration> {
        self.round_timeout_ms.map(Duration::from_millis)
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

//! A deterministic game speaking the pipe protocol, for tests.
//!
//! [`ScriptedGame`] computes the reply to every command byte. It backs both
//! the in-memory connector returned by [`ScriptedGame::connector`] and the
//! `scripted_game` binary, which serves it on stdin/stdout.
//!
//! Frames are functions of the episode counter, the step in the episode and
//! the last action, so that tests can predict every observation.
use crate::{FrameLayout, WireConnector, RESET_BYTE, SENTINEL_BYTE, TERMINATE_BYTE};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    fs::File,
    io::{self, BufReader, Read, Write},
    path::Path,
    sync::{Arc, Mutex, PoisonError},
};

/// Configuration of [`ScriptedGame`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ScriptedGameConfig {
    /// Layout of frames.
    pub layout: FrameLayout,

    /// The game reports terminal on this step of every episode.
    pub episode_len: usize,

    /// Reward of every step.
    pub reward: i32,

    /// Index of the emitted frame (reset frames included, starting at 0) whose
    /// sentinel is replaced by a wrong byte.
    pub corrupt_frame: Option<u64>,
}

impl Default for ScriptedGameConfig {
    fn default() -> Self {
        Self {
            layout: FrameLayout::default(),
            episode_len: 2,
            reward: 1,
            corrupt_frame: None,
        }
    }
}

impl ScriptedGameConfig {
    /// Sets the frame layout.
    pub fn layout(mut self, layout: FrameLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Sets the episode length.
    pub fn episode_len(mut self, v: usize) -> Self {
        self.episode_len = v;
        self
    }

    /// Sets the reward of every step.
    pub fn reward(mut self, v: i32) -> Self {
        self.reward = v;
        self
    }

    /// Sets the frame with a corrupted sentinel.
    pub fn corrupt_frame(mut self, v: Option<u64>) -> Self {
        self.corrupt_frame = v;
        self
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

/// Server side of the protocol.
#[derive(Debug, Clone)]
pub struct ScriptedGame {
    config: ScriptedGameConfig,
    episode: usize,
    step: usize,
    last_action: u8,
    n_frames: u64,
}

impl ScriptedGame {
    /// Creates a game. The first episode starts with the first reset.
    pub fn new(config: ScriptedGameConfig) -> Self {
        Self {
            config,
            episode: 0,
            step: 0,
            last_action: 0,
            n_frames: 0,
        }
    }

    /// The observation at the given point of play.
    ///
    /// Spatial byte `k` is `(31 * episode + step + k) % 251`; the auxiliary
    /// bytes are the last action, the step and the episode.
    pub fn observation(layout: &FrameLayout, episode: usize, step: usize, last_action: u8) -> Vec<u8> {
        let spatial = (0..layout.spatial_len()).map(|k| ((31 * episode + step + k) % 251) as u8);
        let aux = (0..layout.n_aux).map(|j| match j {
            0 => last_action,
            1 => step as u8,
            _ => episode as u8,
        });
        spatial.chain(aux).collect()
    }

    fn frame(&mut self, out: &mut Vec<u8>) {
        out.extend(Self::observation(
            &self.config.layout,
            self.episode,
            self.step,
            self.last_action,
        ));
        if self.config.corrupt_frame == Some(self.n_frames) {
            out.push(b'#');
        } else {
            out.push(SENTINEL_BYTE);
        }
        self.n_frames += 1;
    }

    /// Appends the reply to `command` to `out`. Returns `false` on
    /// [`TERMINATE_BYTE`].
    pub fn respond(&mut self, command: u8, out: &mut Vec<u8>) -> bool {
        match command {
            TERMINATE_BYTE => return false,
            RESET_BYTE => {
                self.episode += 1;
                self.step = 0;
                self.last_action = 0;
                out.push(RESET_BYTE);
                self.frame(out);
            }
            action => {
                self.step += 1;
                self.last_action = action;
                let is_terminal = self.step >= self.config.episode_len;
                out.extend_from_slice(&self.config.reward.to_le_bytes());
                out.extend_from_slice(&(is_terminal as i32).to_le_bytes());
                self.frame(out);
            }
        }
        true
    }

    /// Serves the game over a pair of streams until [`TERMINATE_BYTE`] or
    /// the end of the input.
    pub fn serve<R: Read, W: Write>(&mut self, reader: R, mut writer: W) -> io::Result<()> {
        let mut out = vec![];
        for byte in reader.bytes() {
            out.clear();
            if !self.respond(byte?, &mut out) {
                break;
            }
            writer.write_all(&out)?;
            writer.flush()?;
        }
        Ok(())
    }

    /// A connector talking to a game in memory.
    pub fn connector(config: ScriptedGameConfig) -> WireConnector<GameReader, GameWriter> {
        let layout = config.layout.clone();
        let shared = Arc::new(Mutex::new(Shared {
            game: ScriptedGame::new(config),
            pending: VecDeque::new(),
            terminated: false,
        }));
        WireConnector::new(
            GameReader(shared.clone()),
            GameWriter(shared),
            layout,
        )
    }
}

#[derive(Debug)]
struct Shared {
    game: ScriptedGame,
    pending: VecDeque<u8>,
    terminated: bool,
}

/// Reads the replies of an in-memory [`ScriptedGame`].
///
/// Replies are produced as soon as commands are written, so an empty queue
/// reads as end of stream.
#[derive(Debug)]
pub struct GameReader(Arc<Mutex<Shared>>);

/// Writes commands to an in-memory [`ScriptedGame`].
#[derive(Debug)]
pub struct GameWriter(Arc<Mutex<Shared>>);

impl Read for GameReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut shared = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let n = buf.len().min(shared.pending.len());
        for (dst, src) in buf.iter_mut().zip(shared.pending.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Write for GameWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut shared = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out = vec![];
        for &byte in buf {
            if shared.terminated {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "game has exited"));
            }
            if !shared.game.respond(byte, &mut out) {
                shared.terminated = true;
            }
        }
        shared.pending.extend(out);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

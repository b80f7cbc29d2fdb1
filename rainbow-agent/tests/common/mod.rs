//! Test doubles shared by the integration tests.
#![allow(dead_code)]
use anyhow::Result;
use ndarray::{Array2, Array3, ArrayView2};
use rainbow_core::{
    replay_buffer::{SimpleReplayBuffer, SimpleReplayBufferConfig},
    Approximator, QValues, ReplayBufferBase, SampledBatch, Target, TransitionBatch,
};
use rainbow_pipe_env::{
    scripted::{ScriptedGame, ScriptedGameConfig},
    FrameLayout, PipeBatchEnv, PipeEnvConfig,
};
use std::sync::{Arc, Mutex};

pub fn layout() -> FrameLayout {
    FrameLayout::new(1, 2, 2, 3)
}

/// `n_procs` scripted games with episodes of `episode_len` steps and a
/// constant `reward`.
pub fn scripted_env(n_procs: usize, episode_len: usize, reward: i32) -> PipeBatchEnv {
    let game = ScriptedGameConfig::default()
        .layout(layout())
        .episode_len(episode_len)
        .reward(reward);
    let config = PipeEnvConfig::default()
        .n_procs(n_procs)
        .layout(layout())
        .round_timeout_ms(Some(10_000));
    PipeBatchEnv::build_with(&config, |_| Ok(ScriptedGame::connector(game.clone()))).unwrap()
}

/// Calls received by a [`MockApproximator`].
#[derive(Debug, Default)]
pub struct CallLog {
    pub forward: usize,
    pub greedy: Vec<Vec<usize>>,
    pub gradients: Vec<(Array2<f32>, Target)>,
    pub syncs: usize,
    pub noise: Vec<bool>,
}

/// An approximator whose parameters are one value per action.
///
/// Scalar mode: `Q(s, a) = weights[a] + s[0]`. Categorical mode: the
/// distribution of action `a` puts all its mass on atom `weights[a]`.
/// Gradient steps are recorded, not applied.
pub struct MockApproximator {
    pub weights: Arc<Mutex<Vec<f32>>>,
    pub n_atoms: Option<usize>,
    pub log: Arc<Mutex<CallLog>>,
}

impl MockApproximator {
    pub fn new(weights: Vec<f32>, n_atoms: Option<usize>) -> Self {
        Self {
            weights: Arc::new(Mutex::new(weights)),
            n_atoms,
            log: Arc::new(Mutex::new(CallLog::default())),
        }
    }

    pub fn set_weights(&self, weights: Vec<f32>) {
        *self.weights.lock().unwrap() = weights;
    }

    pub fn get_weights(&self) -> Vec<f32> {
        self.weights.lock().unwrap().clone()
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, CallLog> {
        self.log.lock().unwrap()
    }
}

impl Approximator for MockApproximator {
    fn n_actions(&self) -> usize {
        self.weights.lock().unwrap().len()
    }

    fn forward(&mut self, obs: ArrayView2<f32>) -> Result<QValues> {
        self.log().forward += 1;
        let ws = self.get_weights();
        let b = obs.nrows();
        Ok(match self.n_atoms {
            None => QValues::Scalar(Array2::from_shape_fn((b, ws.len()), |(i, a)| {
                ws[a] + obs[[i, 0]]
            })),
            Some(n_atoms) => QValues::Categorical(Array3::from_shape_fn(
                (b, ws.len(), n_atoms),
                |(_, a, j)| {
                    let atom = (ws[a].max(0.0) as usize).min(n_atoms - 1);
                    if j == atom {
                        1.0
                    } else {
                        0.0
                    }
                },
            )),
        })
    }

    fn greedy_action(&mut self, obs: ArrayView2<f32>) -> Result<Vec<usize>> {
        let ws = self.get_weights();
        let best = ws
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |(ix, max), (a, &w)| {
                if w > max {
                    (a, w)
                } else {
                    (ix, max)
                }
            })
            .0;
        let act = vec![best; obs.nrows()];
        self.log().greedy.push(act.clone());
        Ok(act)
    }

    fn apply_gradient(&mut self, obs: ArrayView2<f32>, target: &Target) -> Result<()> {
        self.log().gradients.push((obs.to_owned(), target.clone()));
        Ok(())
    }

    fn sync_from(&mut self, online: &Self) -> Result<()> {
        self.set_weights(online.get_weights());
        self.log().syncs += 1;
        Ok(())
    }

    fn set_noise(&mut self, enabled: bool) {
        self.log().noise.push(enabled);
    }
}

/// Keeps every pushed batch and every priority update on top of a
/// [`SimpleReplayBuffer`].
pub struct RecordingBuffer {
    pub inner: SimpleReplayBuffer,
    pub pushed: Vec<TransitionBatch>,
    pub sampled: Vec<Vec<usize>>,
    pub priority_updates: Vec<(Vec<usize>, Vec<f32>)>,
}

impl ReplayBufferBase for RecordingBuffer {
    type Config = SimpleReplayBufferConfig;

    fn build(config: &Self::Config) -> Self {
        Self {
            inner: SimpleReplayBuffer::build(config),
            pushed: vec![],
            sampled: vec![],
            priority_updates: vec![],
        }
    }

    fn push(&mut self, tr: TransitionBatch) -> Result<()> {
        self.pushed.push(tr.clone());
        self.inner.push(tr)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn batch(&mut self, size: usize) -> Result<SampledBatch> {
        let batch = self.inner.batch(size)?;
        self.sampled.push(batch.ixs.clone());
        Ok(batch)
    }

    fn update_priority(&mut self, ixs: &[usize], td_errs: &[f32]) -> Result<()> {
        self.priority_updates.push((ixs.to_vec(), td_errs.to_vec()));
        self.inner.update_priority(ixs, td_errs)
    }
}

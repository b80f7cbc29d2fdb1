//! Ring buffer of transitions with optional prioritized sampling.
use super::{sum_tree::SumTree, SimpleReplayBufferConfig};
use crate::{
    error::RainbowError, PrioritySample, ReplayBufferBase, SampledBatch, TransitionBatch,
};
use anyhow::Result;
use log::debug;
use ndarray::{Array2, Axis};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// A replay buffer storing byte observations.
///
/// Observation rows are allocated on the first push, whose width fixes the
/// observation size for the lifetime of the buffer.
pub struct SimpleReplayBuffer {
    capacity: usize,

    /// Next insertion index.
    i: usize,

    size: usize,
    obs: Array2<u8>,
    act: Vec<u8>,
    next_obs: Array2<u8>,
    reward: Vec<f32>,
    is_terminal: Vec<bool>,
    rng: StdRng,

    /// Present in prioritized mode.
    sum_tree: Option<SumTree>,
}

impl SimpleReplayBuffer {
    fn ensure_obs_dim(&mut self, dim: usize) -> Result<()> {
        if self.obs.ncols() == dim {
            return Ok(());
        }
        if self.size > 0 {
            return Err(RainbowError::ShapeMismatch(format!(
                "observation size {} pushed into a buffer of size {}",
                dim,
                self.obs.ncols()
            ))
            .into());
        }
        debug!("Allocates replay buffer: capacity={}, obs_dim={}", self.capacity, dim);
        self.obs = Array2::zeros((self.capacity, dim));
        self.next_obs = Array2::zeros((self.capacity, dim));
        Ok(())
    }
}

impl ReplayBufferBase for SimpleReplayBuffer {
    type Config = SimpleReplayBufferConfig;

    fn build(config: &Self::Config) -> Self {
        let capacity = config.capacity;
        let sum_tree = config
            .per_config
            .as_ref()
            .map(|per| SumTree::new(capacity, per.alpha, per.eps));

        Self {
            capacity,
            i: 0,
            size: 0,
            obs: Array2::zeros((capacity, 0)),
            act: vec![0; capacity],
            next_obs: Array2::zeros((capacity, 0)),
            reward: vec![0.; capacity],
            is_terminal: vec![false; capacity],
            rng: StdRng::seed_from_u64(config.seed),
            sum_tree,
        }
    }

    fn push(&mut self, tr: TransitionBatch) -> Result<()> {
        self.ensure_obs_dim(tr.obs.ncols())?;

        for j in 0..tr.len() {
            let i = self.i;
            self.obs.row_mut(i).assign(&tr.obs.row(j));
            self.next_obs.row_mut(i).assign(&tr.next_obs.row(j));
            self.act[i] = tr.act[j];
            self.reward[i] = tr.reward[j];
            self.is_terminal[i] = tr.is_terminal[j];
            if let Some(sum_tree) = self.sum_tree.as_mut() {
                sum_tree.add(i);
            }

            self.i = (self.i + 1) % self.capacity;
            self.size = (self.size + 1).min(self.capacity);
        }

        Ok(())
    }

    fn len(&self) -> usize {
        self.size
    }

    fn batch(&mut self, size: usize) -> Result<SampledBatch> {
        if self.size == 0 {
            return Err(RainbowError::EmptyReplayBuffer.into());
        }

        let (ixs, priorities) = match &self.sum_tree {
            Some(sum_tree) => {
                let ixs = sum_tree.sample(size, &mut self.rng);
                let priorities = PrioritySample {
                    p: ixs.iter().map(|&ix| sum_tree.priority(ix)).collect(),
                    total: sum_tree.total(),
                    count: self.size,
                };
                (ixs, Some(priorities))
            }
            None => {
                let n = self.size;
                let ixs = (0..size)
                    .map(|_| self.rng.gen_range(0..n))
                    .collect::<Vec<_>>();
                (ixs, None)
            }
        };

        let transitions = TransitionBatch {
            obs: self.obs.select(Axis(0), &ixs),
            act: ixs.iter().map(|&ix| self.act[ix]).collect(),
            reward: ixs.iter().map(|&ix| self.reward[ix]).collect(),
            next_obs: self.next_obs.select(Axis(0), &ixs),
            is_terminal: ixs.iter().map(|&ix| self.is_terminal[ix]).collect(),
        };

        Ok(SampledBatch {
            transitions,
            ixs,
            priorities,
        })
    }

    fn update_priority(&mut self, ixs: &[usize], td_errs: &[f32]) -> Result<()> {
        if ixs.len() != td_errs.len() {
            return Err(RainbowError::ShapeMismatch(format!(
                "{} indices, {} td errors",
                ixs.len(),
                td_errs.len()
            ))
            .into());
        }
        if let Some(sum_tree) = self.sum_tree.as_mut() {
            for (&ix, &td_err) in ixs.iter().zip(td_errs.iter()) {
                sum_tree.update(ix, td_err);
            }
        }
        Ok(())
    }
}

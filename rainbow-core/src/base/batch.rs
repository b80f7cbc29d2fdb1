//! Batches of transitions.
use crate::error::RainbowError;
use anyhow::Result;
use ndarray::{Array2, Axis};

/// One synchronized round of a [`BatchEnv`](crate::BatchEnv).
///
/// Row/element `i` of every field belongs to environment instance `i`, and all
/// of them come from the same logical step.
#[derive(Clone, Debug, PartialEq)]
pub struct Round {
    /// Observations before the step, one row per instance.
    pub old_obs: Array2<u8>,

    /// Actions applied in the step.
    pub act: Vec<u8>,

    /// Raw rewards reported by the instances.
    pub reward: Vec<i32>,

    /// Observations after the step, one row per instance.
    pub new_obs: Array2<u8>,

    /// `true` if the episode ended at this step.
    pub is_terminal: Vec<bool>,

    /// Steps taken in the current episode after this round; `0` right after a reset.
    pub episode_step: Vec<usize>,
}

impl Round {
    /// The number of instances in the round.
    pub fn len(&self) -> usize {
        self.act.len()
    }

    /// Returns `true` if the round holds no instance.
    pub fn is_empty(&self) -> bool {
        self.act.is_empty()
    }
}

/// Transitions `(o_t, a_t, r_t, o_t+n, done)` as parallel arrays.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionBatch {
    /// `o_t`, one row per transition.
    pub obs: Array2<u8>,

    /// `a_t`.
    pub act: Vec<u8>,

    /// Accumulated (and clipped) rewards.
    pub reward: Vec<f32>,

    /// `o_t+n`, one row per transition.
    pub next_obs: Array2<u8>,

    /// Terminal flags.
    pub is_terminal: Vec<bool>,
}

impl TransitionBatch {
    /// Constructs a batch, checking that all fields agree in length.
    pub fn new(
        obs: Array2<u8>,
        act: Vec<u8>,
        reward: Vec<f32>,
        next_obs: Array2<u8>,
        is_terminal: Vec<bool>,
    ) -> Result<Self> {
        let n = obs.nrows();
        if act.len() != n
            || reward.len() != n
            || next_obs.nrows() != n
            || is_terminal.len() != n
            || next_obs.ncols() != obs.ncols()
        {
            return Err(RainbowError::ShapeMismatch(format!(
                "obs={:?}, act={}, reward={}, next_obs={:?}, is_terminal={}",
                obs.dim(),
                act.len(),
                reward.len(),
                next_obs.dim(),
                is_terminal.len()
            ))
            .into());
        }
        Ok(Self {
            obs,
            act,
            reward,
            next_obs,
            is_terminal,
        })
    }

    /// The number of transitions.
    pub fn len(&self) -> usize {
        self.act.len()
    }

    /// Returns `true` if there is no transition.
    pub fn is_empty(&self) -> bool {
        self.act.is_empty()
    }

    /// Returns the transitions at the given positions.
    pub fn select(&self, ixs: &[usize]) -> Self {
        Self {
            obs: self.obs.select(Axis(0), ixs),
            act: ixs.iter().map(|&i| self.act[i]).collect(),
            reward: ixs.iter().map(|&i| self.reward[i]).collect(),
            next_obs: self.next_obs.select(Axis(0), ixs),
            is_terminal: ixs.iter().map(|&i| self.is_terminal[i]).collect(),
        }
    }
}

/// Priorities of the sampled transitions, reported by a prioritized buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct PrioritySample {
    /// Priority of each sampled transition.
    pub p: Vec<f32>,

    /// Sum of priorities over the whole buffer.
    pub total: f32,

    /// The number of transitions stored in the buffer.
    pub count: usize,
}

impl PrioritySample {
    /// Importance sampling weights `(p_i * count / total)^(-beta)`.
    pub fn weights(&self, beta: f32) -> Vec<f32> {
        let n = self.count as f32 / self.total;
        self.p.iter().map(|p| (p * n).powf(-beta)).collect()
    }
}

/// A batch sampled from a replay buffer.
#[derive(Clone, Debug)]
pub struct SampledBatch {
    /// Sampled transitions.
    pub transitions: TransitionBatch,

    /// Indices of the transitions in the buffer, used for priority updates.
    pub ixs: Vec<usize>,

    /// `Some` when the buffer samples by priority.
    pub priorities: Option<PrioritySample>,
}

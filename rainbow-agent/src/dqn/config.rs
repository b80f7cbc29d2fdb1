//! Configuration of DQN agent.
use anyhow::Result;
use log::info;
use rainbow_core::{CategoricalConfig, LinearScheduler};
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Dqn`](super::Dqn).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DqnConfig {
    /// Discount factor.
    pub gamma: f32,

    /// Batch size of a gradient step.
    pub batch_size: usize,

    /// A gradient step is taken for every `update_freq` stored transitions.
    pub update_freq: usize,

    /// Interval of target network synchronization in gradient steps.
    pub target_update_freq: usize,

    /// No gradient step is taken while the replay buffer holds fewer transitions.
    pub min_transitions_warmup: usize,

    /// Selects the successor action with the online network.
    pub double_dqn: bool,

    /// The number of rounds accumulated into a stored transition.
    pub num_step: usize,

    /// Explores with parameter noise of the approximator instead of epsilon-greedy.
    pub noisy: bool,

    /// Observation bytes are divided by this value before reaching the approximator.
    pub obs_scale: f32,

    /// Epsilon of epsilon-greedy exploration, counted in environment steps.
    pub epsilon: LinearScheduler,

    /// Exponent of importance sampling weights, counted in gradient steps.
    pub beta: LinearScheduler,

    /// Support of value distributions. Scalar Q-values if `None`.
    pub distributional: Option<CategoricalConfig>,

    /// Epsilon used in evaluation.
    pub eval_epsilon: f32,

    /// Random seed of exploration.
    pub seed: u64,
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            batch_size: 32,
            update_freq: 1,
            target_update_freq: 10_000,
            min_transitions_warmup: 32,
            double_dqn: true,
            num_step: 1,
            noisy: false,
            obs_scale: 255.0,
            epsilon: LinearScheduler::new(1.0, 0.1, 2_000_000),
            beta: LinearScheduler::new(0.5, 1.0, 2_000_000),
            distributional: Some(CategoricalConfig::default()),
            eval_epsilon: 0.0,
            seed: 42,
        }
    }
}

impl DqnConfig {
    /// Sets the discount factor.
    pub fn gamma(mut self, v: f32) -> Self {
        self.gamma = v;
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the number of stored transitions per gradient step.
    pub fn update_freq(mut self, v: usize) -> Self {
        self.update_freq = v;
        self
    }

    /// Sets the interval of target network synchronization.
    pub fn target_update_freq(mut self, v: usize) -> Self {
        self.target_update_freq = v;
        self
    }

    /// Interval before starting optimization.
    pub fn min_transitions_warmup(mut self, v: usize) -> Self {
        self.min_transitions_warmup = v;
        self
    }

    /// Double DQN.
    pub fn double_dqn(mut self, v: bool) -> Self {
        self.double_dqn = v;
        self
    }

    /// Sets the number of steps of multi-step returns.
    pub fn num_step(mut self, v: usize) -> Self {
        self.num_step = v;
        self
    }

    /// Noisy network exploration.
    pub fn noisy(mut self, v: bool) -> Self {
        self.noisy = v;
        self
    }

    /// Sets the observation scale.
    pub fn obs_scale(mut self, v: f32) -> Self {
        self.obs_scale = v;
        self
    }

    /// Sets the epsilon schedule.
    pub fn epsilon(mut self, v: LinearScheduler) -> Self {
        self.epsilon = v;
        self
    }

    /// Sets the beta schedule.
    pub fn beta(mut self, v: LinearScheduler) -> Self {
        self.beta = v;
        self
    }

    /// Sets the support of value distributions.
    pub fn distributional(mut self, v: Option<CategoricalConfig>) -> Self {
        self.distributional = v;
        self
    }

    /// Sets epsilon for evaluation.
    pub fn eval_epsilon(mut self, v: f32) -> Self {
        self.eval_epsilon = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Loads [`DqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of DQN agent from {}", path_.display());
        Ok(b)
    }

    /// Saves [`DqnConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of DQN agent into {}", path_.display());
        Ok(())
    }
}

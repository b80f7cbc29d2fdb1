//! Configuration of [`Trainer`](super::Trainer).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trainer`](super::Trainer).
///
/// Quantities are counted in stored transitions.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// Transitions trained on in total.
    pub num_iterations: usize,

    /// Transitions trained on between two evaluations.
    pub eval_interval: usize,

    /// Transitions stored without training before the first evaluation.
    pub num_burn_in: usize,

    /// The number of observations on which mean max Q is tracked.
    pub num_fixed_samples: usize,

    /// Episodes per evaluation.
    pub num_eval_episodes: usize,

    /// Random seed for collecting the fixed samples.
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            num_iterations: 20_000_000,
            eval_interval: 20_000,
            num_burn_in: 50_000,
            num_fixed_samples: 10_000,
            num_eval_episodes: 20,
            seed: 42,
        }
    }
}

impl TrainerConfig {
    /// Sets the number of transitions trained on.
    pub fn num_iterations(mut self, v: usize) -> Self {
        self.num_iterations = v;
        self
    }

    /// Sets the interval of evaluation.
    pub fn eval_interval(mut self, v: usize) -> Self {
        self.eval_interval = v;
        self
    }

    /// Sets the number of burn-in transitions.
    pub fn num_burn_in(mut self, v: usize) -> Self {
        self.num_burn_in = v;
        self
    }

    /// Sets the number of fixed samples.
    pub fn num_fixed_samples(mut self, v: usize) -> Self {
        self.num_fixed_samples = v;
        self
    }

    /// Sets the number of episodes per evaluation.
    pub fn num_eval_episodes(mut self, v: usize) -> Self {
        self.num_eval_episodes = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

//! Train [`Dqn`].
mod config;
use crate::dqn::{fixed_samples, Dqn};
use anyhow::{ensure, Result};
pub use config::TrainerConfig;
use log::info;
use rainbow_core::{
    record::{Record, RecordValue, Recorder},
    Approximator, BatchEnv, ReplayBufferBase,
};

/// Runs the training loop of a [`Dqn`] agent.
///
/// 1. Collects fixed samples with random actions, used to track mean max Q.
/// 2. Fills the replay buffer with `num_burn_in` transitions without training.
/// 3. Until `num_iterations` transitions have been trained on:
///     1. Evaluates the agent and computes mean max Q on the fixed samples.
///     2. Writes them to the recorder as `iter`, `eval_reward_mean`,
///        `eval_reward_std` and `mean_max_q`.
///     3. Trains the agent on `eval_interval` transitions and writes the
///        record returned by [`Dqn::fit`] with `iter`.
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    /// Constructs a trainer.
    pub fn build(config: TrainerConfig) -> Self {
        Self { config }
    }

    /// Trains `agent`.
    pub fn train<Q, E, R, D>(&mut self, agent: &mut Dqn<Q>, env: &mut E, buffer: &mut R, recorder: &mut D) -> Result<()>
    where
        Q: Approximator,
        E: BatchEnv,
        R: ReplayBufferBase,
        D: Recorder,
    {
        let config = &self.config;
        ensure!(config.eval_interval > 0, "eval_interval must be positive");

        info!("Prepares {} fixed samples", config.num_fixed_samples);
        let samples = fixed_samples(env, agent.n_actions(), config.num_fixed_samples, config.seed)?;

        info!("Burns in the replay buffer with {} transitions", config.num_burn_in);
        agent.fit(env, buffer, config.num_burn_in, false)?;

        let mut i = 0;
        while i < config.num_iterations {
            let (reward_mean, reward_std) = agent.evaluate(env, config.num_eval_episodes)?;
            let mean_max_q = agent.mean_max_q(&samples)?;
            info!(
                "iter={}, mean_max_q={}, eval_reward_mean={}, eval_reward_std={}",
                i, mean_max_q, reward_mean, reward_std
            );
            recorder.write(Record::from_slice(&[
                ("iter", RecordValue::Scalar(i as f32)),
                ("mean_max_q", RecordValue::Scalar(mean_max_q)),
                ("eval_reward_mean", RecordValue::Scalar(reward_mean)),
                ("eval_reward_std", RecordValue::Scalar(reward_std)),
            ]));

            let mut record = Record::from_scalar("iter", i as f32);
            record.merge_inplace(agent.fit(env, buffer, config.eval_interval, true)?);
            recorder.write(record);

            i += config.eval_interval;
        }

        Ok(())
    }
}

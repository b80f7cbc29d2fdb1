//! DQN agent with multi-step, double and distributional targets.
use super::{
    config::DqnConfig,
    explorer::EpsilonGreedy,
    target::{
        argmax_rows, cross_entropy, gather, gather_dist, huber, max_rows, project_distribution,
        scalar_targets, weighted_mean, MultiStepReturn,
    },
};
use anyhow::{Context, Result};
use log::{debug, info};
use ndarray::{Array2, Axis};
use rainbow_core::{
    error::RainbowError,
    record::{Record, RecordValue},
    Approximator, BatchEnv, CategoricalSupport, QValues, ReplayBufferBase, Round,
    Target, TargetValues, TransitionBatch,
};

/// Rows of observations evaluated at once by [`Dqn::mean_max_q`].
const MEAN_MAX_Q_CHUNK: usize = 1000;

fn collaborator(what: &'static str) -> RainbowError {
    RainbowError::CollaboratorFailure(what)
}

/// Fails unless `out` holds `batch_size` rows of `n_actions` actions.
fn check_shape(out: &QValues, batch_size: usize, n_actions: usize) -> Result<(), RainbowError> {
    if out.batch_size() != batch_size || out.n_actions() != n_actions {
        return Err(RainbowError::ShapeMismatch(format!(
            "approximator returns {} rows of {} actions, expected {} rows of {}",
            out.batch_size(),
            out.n_actions(),
            batch_size,
            n_actions
        )));
    }
    Ok(())
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// DQN agent.
///
/// The agent owns the online and target approximators, the exploration
/// schedules and the step counters. It does not own the environment nor the
/// replay buffer, which are passed to [`Dqn::fit`].
///
/// ```mermaid
/// graph LR
///     A[Dqn]-->|actions|B[BatchEnv]
///     B -->|Round|A
///     A -->|TransitionBatch|C[ReplayBufferBase]
///     C -->|SampledBatch|A
///     A -->|Target|D[Approximator]
///     A -->|TD errors|C
/// ```
///
/// Each stored transition spans `num_step` rounds. In a gradient step the
/// successor action is chosen by the online approximator (double DQN) or the
/// target one, and the target is either scalar, `r + gamma^n * Q'(s', a')`,
/// or the categorical projection of `r + gamma^n * z` onto the support.
pub struct Dqn<Q: Approximator> {
    qnet: Q,
    qnet_tgt: Q,
    config: DqnConfig,
    support: Option<CategoricalSupport>,
    explorer: EpsilonGreedy,
    n_actions: usize,
    train: bool,

    /// Environment steps taken in training, epsilon is annealed on it.
    env_steps: usize,

    /// Gradient steps, beta is annealed on it.
    n_opts: usize,
}

impl<Q: Approximator> Dqn<Q> {
    /// Builds the agent. The target approximator is synchronized with the
    /// online one.
    pub fn build(config: DqnConfig, qnet: Q, mut qnet_tgt: Q) -> Result<Self> {
        let n_actions = qnet.n_actions();
        if n_actions == 0 || n_actions > u8::MAX as usize + 1 {
            return Err(RainbowError::ShapeMismatch(format!(
                "{} actions do not fit in the action byte",
                n_actions
            ))
            .into());
        }
        if config.num_step == 0 || config.update_freq == 0 || config.target_update_freq == 0 {
            return Err(RainbowError::ShapeMismatch(format!(
                "num_step, update_freq and target_update_freq must be positive: {:?}",
                config
            ))
            .into());
        }
        let support = match &config.distributional {
            Some(c) => Some(CategoricalSupport::build(c)?),
            None => None,
        };
        qnet_tgt
            .sync_from(&qnet)
            .context(collaborator("target network sync"))?;

        Ok(Self {
            qnet,
            qnet_tgt,
            explorer: EpsilonGreedy::new(config.seed),
            config,
            support,
            n_actions,
            train: false,
            env_steps: 0,
            n_opts: 0,
        })
    }

    /// Switches to training mode. Parameter noise is on in noisy mode.
    pub fn train(&mut self) {
        self.train = true;
        self.qnet.set_noise(self.config.noisy);
    }

    /// Switches to evaluation mode. Parameter noise is off.
    pub fn eval(&mut self) {
        self.train = false;
        self.qnet.set_noise(false);
    }

    /// Returns `true` in training mode.
    pub fn is_train(&self) -> bool {
        self.train
    }

    /// The online approximator.
    pub fn qnet(&self) -> &Q {
        &self.qnet
    }

    /// The target approximator.
    pub fn qnet_tgt(&self) -> &Q {
        &self.qnet_tgt
    }

    /// The number of actions.
    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    /// Environment steps taken by [`Dqn::fit`].
    pub fn env_steps(&self) -> usize {
        self.env_steps
    }

    /// Gradient steps taken.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// Current epsilon of exploration; `0` in noisy mode.
    pub fn epsilon(&self) -> f32 {
        if self.config.noisy {
            0.0
        } else {
            self.config.epsilon.value(self.env_steps)
        }
    }

    /// Current exponent of importance sampling weights.
    pub fn beta(&self) -> f32 {
        self.config.beta.value(self.n_opts)
    }

    fn normalize(&self, obs: &Array2<u8>) -> Array2<f32> {
        let scale = self.config.obs_scale;
        obs.mapv(|v| v as f32 / scale)
    }

    /// Selects actions for a batch of observations with epsilon-greedy.
    pub fn select_action(&mut self, obs: &Array2<u8>, eps: f32) -> Result<Vec<u8>> {
        let n = obs.nrows();
        let x = self.normalize(obs);
        let qnet = &mut self.qnet;
        let act = self.explorer.action(eps, n, self.n_actions, || {
            qnet.greedy_action(x.view())
                .context(collaborator("approximator greedy action"))
        })?;
        Ok(act.into_iter().map(|a| a as u8).collect())
    }

    /// Plays `num_step` rounds from `round`, the last collected one, and
    /// returns the accumulated transitions with the last round.
    pub fn multi_step_sample<E: BatchEnv>(
        &mut self,
        env: &mut E,
        round: Round,
    ) -> Result<(TransitionBatch, Round)> {
        let n = env.n_procs();
        let mut acc = MultiStepReturn::new(self.config.gamma, n);
        let mut last = round;
        let mut first = None;

        for _ in 0..self.config.num_step {
            let act = self.select_action(&last.new_obs, self.epsilon())?;
            env.take_action(&act)?;
            last = env.get_state()?;
            self.env_steps += n;

            acc.push(&last.reward, &last.is_terminal);
            if first.is_none() {
                first = Some((last.old_obs.clone(), last.act.clone()));
            }
        }

        let (reward, is_terminal) = acc.into_parts();
        let (obs, act) = match first {
            Some(first) => first,
            None => (last.old_obs.clone(), last.act.clone()),
        };
        let tr = TransitionBatch::new(obs, act, reward, last.new_obs.clone(), is_terminal)?;
        Ok((tr, last))
    }

    /// Computes targets for `tr` with the current approximators.
    ///
    /// Returns the normalized observations, the target and the per-sample
    /// TD errors: `|y - Q(s, a)|`, or the cross-entropy in distributional mode.
    fn targets(&mut self, tr: &TransitionBatch) -> Result<(Array2<f32>, Target, Vec<f32>)> {
        let obs = self.normalize(&tr.obs);
        let next_obs = self.normalize(&tr.next_obs);
        let actions = tr.act.iter().map(|&a| a as usize).collect::<Vec<_>>();
        let discount = self.config.gamma.powi(self.config.num_step as i32);

        let next_actions = if self.config.double_dqn {
            Some(
                self.qnet
                    .greedy_action(next_obs.view())
                    .context(collaborator("approximator greedy action"))?,
            )
        } else {
            None
        };
        let out_next = self
            .qnet_tgt
            .forward(next_obs.view())
            .context(collaborator("target approximator forward"))?;
        let out = self
            .qnet
            .forward(obs.view())
            .context(collaborator("approximator forward"))?;
        check_shape(&out_next, tr.len(), self.n_actions)?;
        check_shape(&out, tr.len(), self.n_actions)?;

        let (values, td_errs): (TargetValues, Vec<f32>) = match (out_next, out, &self.support) {
            (QValues::Scalar(q_next), QValues::Scalar(q), None) => {
                let q_next = match next_actions {
                    Some(a) => gather(q_next.view(), &a),
                    None => max_rows(q_next.view()),
                };
                let y = scalar_targets(&tr.reward, &tr.is_terminal, &q_next, discount);
                let td_errs = y
                    .iter()
                    .zip(gather(q.view(), &actions).iter())
                    .map(|(y, q)| (y - q).abs())
                    .collect();
                (TargetValues::Scalar(y), td_errs)
            }
            (QValues::Categorical(p_next), QValues::Categorical(p), Some(support)) => {
                if p_next.len_of(Axis(2)) != support.n_atoms() || p.len_of(Axis(2)) != support.n_atoms() {
                    return Err(RainbowError::ShapeMismatch(format!(
                        "approximator returns {} atoms, the support has {}",
                        p.len_of(Axis(2)),
                        support.n_atoms()
                    ))
                    .into());
                }
                let next_actions = match next_actions {
                    Some(a) => a,
                    None => argmax_rows(support.expectation(p_next.view()).view()),
                };
                let p_next = gather_dist(p_next.view(), &next_actions);
                let m = project_distribution(support, p_next.view(), &tr.reward, &tr.is_terminal, discount);
                let p = gather_dist(p.view(), &actions);
                let td_errs = m
                    .outer_iter()
                    .zip(p.outer_iter())
                    .map(|(m, p)| cross_entropy(m, p))
                    .collect();
                (TargetValues::Categorical(m), td_errs)
            }
            _ => {
                return Err(RainbowError::ShapeMismatch(
                    "approximator output does not match the distributional setting".to_string(),
                )
                .into())
            }
        };

        let target = Target {
            actions,
            values,
            weights: None,
        };
        Ok((obs, target, td_errs))
    }

    /// Per-sample TD error magnitudes of `tr` without a gradient step.
    pub fn td_errors(&mut self, tr: &TransitionBatch) -> Result<Vec<f32>> {
        let (_, _, td_errs) = self.targets(tr)?;
        Ok(td_errs)
    }

    /// Takes a gradient step on a batch from `buffer` and returns the loss
    /// before the step.
    fn update_critic<R: ReplayBufferBase>(&mut self, buffer: &mut R) -> Result<f32> {
        let batch = buffer
            .batch(self.config.batch_size)
            .context(collaborator("replay buffer batch"))?;
        let (obs, mut target, td_errs) = self.targets(&batch.transitions)?;
        target.weights = batch.priorities.as_ref().map(|ps| ps.weights(self.beta()));

        let losses = match &target.values {
            TargetValues::Scalar(_) => td_errs.iter().map(|&e| huber(e)).collect::<Vec<_>>(),
            TargetValues::Categorical(_) => td_errs.clone(),
        };
        let loss = weighted_mean(&losses, target.weights.as_deref());

        self.qnet
            .apply_gradient(obs.view(), &target)
            .context(collaborator("approximator gradient step"))?;
        if batch.priorities.is_some() {
            buffer
                .update_priority(&batch.ixs, &td_errs)
                .context(collaborator("replay buffer priority update"))?;
        }

        self.n_opts += 1;
        if self.n_opts % self.config.target_update_freq == 0 {
            self.qnet_tgt
                .sync_from(&self.qnet)
                .context(collaborator("target network sync"))?;
            info!("Synchronized target network at {} gradient steps", self.n_opts);
        }

        Ok(loss)
    }

    /// Takes a gradient step if `buffer` holds enough transitions.
    pub fn opt<R: ReplayBufferBase>(&mut self, buffer: &mut R) -> Result<Option<f32>> {
        if buffer.len() >= self.config.min_transitions_warmup {
            Ok(Some(self.update_critic(buffer)?))
        } else {
            Ok(None)
        }
    }

    /// Stores `num_iterations` transitions collected from `env` into `buffer`,
    /// taking gradient steps on the way if `do_train`.
    ///
    /// For every block of `n_procs` stored transitions, indexed from `t` to
    /// `t + n_procs` in this call, one gradient step is taken per index
    /// divisible by `update_freq`.
    pub fn fit<E, R>(&mut self, env: &mut E, buffer: &mut R, num_iterations: usize, do_train: bool) -> Result<Record>
    where
        E: BatchEnv,
        R: ReplayBufferBase,
    {
        self.train();
        let n = env.n_procs();
        env.reset()?;
        let mut round = env.get_state()?;
        let mut losses = vec![];

        let mut t = 0;
        while t < num_iterations {
            let (tr, last) = self.multi_step_sample(env, round)?;
            round = last;
            buffer
                .push(tr)
                .context(collaborator("replay buffer push"))?;

            if do_train {
                let n_updates = (t..t + n)
                    .filter(|i| i % self.config.update_freq == 0)
                    .count();
                for _ in 0..n_updates {
                    if let Some(loss) = self.opt(buffer)? {
                        losses.push(loss);
                    }
                }
            }
            t += n;
        }
        debug!(
            "fit: {} transitions, {} gradient steps, epsilon={}, beta={}",
            t,
            losses.len(),
            self.epsilon(),
            self.beta()
        );

        let mut record = Record::from_slice(&[
            ("epsilon", RecordValue::Scalar(self.epsilon())),
            ("beta", RecordValue::Scalar(self.beta())),
            ("env_steps", RecordValue::Scalar(self.env_steps as f32)),
            ("n_opts", RecordValue::Scalar(self.n_opts as f32)),
        ]);
        if !losses.is_empty() {
            record.insert("loss", RecordValue::Scalar(weighted_mean(&losses, None)));
        }
        Ok(record)
    }

    /// Plays until `num_episodes` episodes have ended and returns the mean and
    /// the standard deviation of their returns.
    ///
    /// Rewards are summed raw, the one of the terminal step included. Episodes
    /// in progress at the start of the call are discarded by the reset.
    pub fn evaluate<E: BatchEnv>(&mut self, env: &mut E, num_episodes: usize) -> Result<(f32, f32)> {
        if num_episodes == 0 {
            return Ok((0.0, 0.0));
        }
        let was_train = self.train;
        self.eval();

        let n = env.n_procs();
        env.reset()?;
        let mut round = env.get_state()?;
        let mut acc = vec![0f32; n];
        let mut returns = vec![];

        while returns.len() < num_episodes {
            let act = self.select_action(&round.new_obs, self.config.eval_epsilon)?;
            env.take_action(&act)?;
            round = env.get_state()?;
            for i in 0..n {
                acc[i] += round.reward[i] as f32;
                if round.is_terminal[i] {
                    returns.push(acc[i]);
                    acc[i] = 0.0;
                }
            }
        }

        if was_train {
            self.train();
        }

        let mean = returns.iter().sum::<f32>() / returns.len() as f32;
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f32>() / returns.len() as f32;
        info!(
            "Evaluated {} episodes: mean={}, std={}",
            returns.len(),
            mean,
            var.sqrt()
        );
        Ok((mean, var.sqrt()))
    }

    /// Mean over `samples` of the largest Q-value of the online approximator,
    /// the expected value of the distributions in distributional mode.
    pub fn mean_max_q(&mut self, samples: &Array2<u8>) -> Result<f32> {
        if samples.nrows() == 0 {
            return Ok(0.0);
        }
        let mut sum = 0f32;
        for chunk in samples.axis_chunks_iter(Axis(0), MEAN_MAX_Q_CHUNK) {
            let x = chunk.mapv(|v| v as f32 / self.config.obs_scale);
            let out = self
                .qnet
                .forward(x.view())
                .context(collaborator("approximator forward"))?;
            check_shape(&out, chunk.nrows(), self.n_actions)?;
            let q = match (out, &self.support) {
                (QValues::Scalar(q), _) => q,
                (QValues::Categorical(p), Some(support)) => support.expectation(p.view()),
                (QValues::Categorical(_), None) => {
                    return Err(RainbowError::ShapeMismatch(
                        "categorical output without a support".to_string(),
                    )
                    .into())
                }
            };
            sum += max_rows(q.view()).iter().sum::<f32>();
        }
        Ok(sum / samples.nrows() as f32)
    }
}

impl<Q: Approximator> std::fmt::Debug for Dqn<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dqn")
            .field("config", &self.config)
            .field("n_actions", &self.n_actions)
            .field("train", &self.train)
            .field("env_steps", &self.env_steps)
            .field("n_opts", &self.n_opts)
            .finish()
    }
}

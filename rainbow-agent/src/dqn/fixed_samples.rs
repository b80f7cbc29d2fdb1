//! Observations for tracking Q-values during training.
use anyhow::{ensure, Result};
use log::info;
use ndarray::Array2;
use rainbow_core::BatchEnv;

/// Collects `n` observations by playing uniformly random actions.
///
/// The observations after every round are taken, so the samples come from
/// all environments in turn.
pub fn fixed_samples<E: BatchEnv>(env: &mut E, n_actions: usize, n: usize, seed: u64) -> Result<Array2<u8>> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let n_procs = env.n_procs();
    ensure!(n_procs > 0, "no environment to sample from");

    env.reset()?;
    let mut round = env.get_state()?;
    let obs_len = round.new_obs.ncols();
    let mut buf = Vec::with_capacity(n * obs_len);

    while buf.len() < n * obs_len {
        let act = (0..n_procs)
            .map(|_| rng.usize(..n_actions) as u8)
            .collect::<Vec<_>>();
        env.take_action(&act)?;
        round = env.get_state()?;
        buf.extend(round.new_obs.iter());
    }
    buf.truncate(n * obs_len);
    info!("Collected {} fixed samples", n);

    Ok(Array2::from_shape_vec((n, obs_len), buf)?)
}

//! Targets and losses of Q-learning.
//!
//! Functions here are pure array computations; [`Dqn`](super::Dqn) feeds them
//! with approximator outputs.
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayView3, Axis};
use rainbow_core::CategoricalSupport;

/// Probabilities are floored at this value before taking the logarithm.
pub const LOG_EPS: f32 = 1e-8;

/// Clips a reward to `{-1, 0, 1}`.
pub fn sign(r: i32) -> f32 {
    r.signum() as f32
}

/// Accumulates discounted, sign-clipped rewards over consecutive rounds.
///
/// After rounds `0..n`, the reward is `sum_i gamma^i * sign(r_i)` and the
/// terminal flag is set if any round was terminal.
#[derive(Clone, Debug)]
pub struct MultiStepReturn {
    gamma: f32,
    discount: f32,
    reward: Vec<f32>,
    is_terminal: Vec<bool>,
}

impl MultiStepReturn {
    /// Starts an accumulation over `n` environments.
    pub fn new(gamma: f32, n: usize) -> Self {
        Self {
            gamma,
            discount: 1.0,
            reward: vec![0.0; n],
            is_terminal: vec![false; n],
        }
    }

    /// Adds a round.
    pub fn push(&mut self, reward: &[i32], is_terminal: &[bool]) {
        for (acc, &r) in self.reward.iter_mut().zip(reward.iter()) {
            *acc += self.discount * sign(r);
        }
        for (acc, &t) in self.is_terminal.iter_mut().zip(is_terminal.iter()) {
            *acc |= t;
        }
        self.discount *= self.gamma;
    }

    /// Accumulated rewards and terminal flags.
    pub fn into_parts(self) -> (Vec<f32>, Vec<bool>) {
        (self.reward, self.is_terminal)
    }
}

/// Index of the largest value in each row.
pub fn argmax_rows(q: ArrayView2<f32>) -> Vec<usize> {
    q.outer_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |(ix, max), (i, &v)| {
                    if v > max {
                        (i, v)
                    } else {
                        (ix, max)
                    }
                })
                .0
        })
        .collect()
}

/// The largest value in each row.
pub fn max_rows(q: ArrayView2<f32>) -> Vec<f32> {
    q.outer_iter()
        .map(|row| row.iter().cloned().fold(f32::NEG_INFINITY, f32::max))
        .collect()
}

/// `q[i, actions[i]]` for each row.
pub fn gather(q: ArrayView2<f32>, actions: &[usize]) -> Vec<f32> {
    actions
        .iter()
        .enumerate()
        .map(|(i, &a)| q[[i, a]])
        .collect()
}

/// `p[i, actions[i], :]` for each sample.
pub fn gather_dist(p: ArrayView3<f32>, actions: &[usize]) -> Array2<f32> {
    let n_atoms = p.len_of(Axis(2));
    let mut out = Array2::zeros((actions.len(), n_atoms));
    for (i, &a) in actions.iter().enumerate() {
        out.row_mut(i).assign(&p.slice(ndarray::s![i, a, ..]));
    }
    out
}

/// `y = reward + (1 - terminal) * discount * q_next`.
pub fn scalar_targets(reward: &[f32], is_terminal: &[bool], q_next: &[f32], discount: f32) -> Array1<f32> {
    reward
        .iter()
        .zip(is_terminal.iter())
        .zip(q_next.iter())
        .map(|((&r, &t), &q)| if t { r } else { r + discount * q })
        .collect()
}

/// Projects the shifted distributions `reward + (1 - terminal) * discount * z`
/// back onto the support.
///
/// `p_next` holds one distribution per row. The mass of atom `z_i` goes to the
/// two atoms around `Tz_i`, clamped to the support, in proportion to the
/// distance; all of it lands on one atom when `Tz_i` coincides with it.
pub fn project_distribution(
    support: &CategoricalSupport,
    p_next: ArrayView2<f32>,
    reward: &[f32],
    is_terminal: &[bool],
    discount: f32,
) -> Array2<f32> {
    let n_atoms = support.n_atoms();
    let (v_min, v_max, delta_z) = (support.v_min(), support.v_max(), support.delta_z());
    let mut m = Array2::zeros((p_next.nrows(), n_atoms));

    for (b, p) in p_next.outer_iter().enumerate() {
        let d = if is_terminal[b] { 0.0 } else { discount };
        for (i, &z) in support.atoms().iter().enumerate() {
            let tz = (reward[b] + d * z).max(v_min).min(v_max);
            let pos = (tz - v_min) / delta_z;
            let l = pos.floor();
            let u = pos.ceil();
            let li = (l as usize).min(n_atoms - 1);
            let ui = (u as usize).min(n_atoms - 1);
            if li == ui {
                m[[b, li]] += p[i];
            } else {
                m[[b, li]] += p[i] * (u - pos);
                m[[b, ui]] += p[i] * (pos - l);
            }
        }
    }
    m
}

/// Huber loss with `delta = 1`.
pub fn huber(x: f32) -> f32 {
    let a = x.abs();
    if a <= 1.0 {
        0.5 * x * x
    } else {
        a - 0.5
    }
}

/// `-sum_j target_j * ln(max(p_j, LOG_EPS))`.
pub fn cross_entropy(target: ArrayView1<f32>, p: ArrayView1<f32>) -> f32 {
    -target
        .iter()
        .zip(p.iter())
        .map(|(&m, &p)| m * p.max(LOG_EPS).ln())
        .sum::<f32>()
}

/// Mean of `losses`, each multiplied by its weight if given.
pub fn weighted_mean(losses: &[f32], weights: Option<&[f32]>) -> f32 {
    if losses.is_empty() {
        return 0.0;
    }
    let sum: f32 = match weights {
        Some(ws) => losses.iter().zip(ws.iter()).map(|(l, w)| l * w).sum(),
        None => losses.iter().sum(),
    };
    sum / losses.len() as f32
}

//! Epsilon-greedy exploration.
use anyhow::Result;

/// Epsilon-greedy action selection over a batch of observations.
///
/// One coin is flipped per batch: either every action is drawn uniformly or
/// all of them are greedy.
pub struct EpsilonGreedy {
    rng: fastrand::Rng,
}

impl EpsilonGreedy {
    /// Constructs an explorer.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Returns `n` actions. `greedy` is only called when the batch is greedy.
    pub fn action<F>(&mut self, eps: f32, n: usize, n_actions: usize, greedy: F) -> Result<Vec<usize>>
    where
        F: FnOnce() -> Result<Vec<usize>>,
    {
        if self.rng.f32() < eps {
            Ok((0..n).map(|_| self.rng.usize(..n_actions)).collect())
        } else {
            greedy()
        }
    }
}

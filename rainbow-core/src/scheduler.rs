//! Linear annealing of exploration and importance sampling parameters.
use serde::{Deserialize, Serialize};

/// Linearly interpolates from `start` to `end` over `n_steps` steps and stays
/// at `end` afterwards.
///
/// Used for epsilon of epsilon-greedy exploration, counted in environment steps,
/// and for the exponent `beta` of importance sampling weights, counted in
/// optimization steps.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct LinearScheduler {
    /// Value at step 0.
    pub start: f32,

    /// Value from step `n_steps` on.
    pub end: f32,

    /// Steps until the value reaches `end`.
    pub n_steps: usize,
}

impl LinearScheduler {
    /// Creates a scheduler.
    pub fn new(start: f32, end: f32, n_steps: usize) -> Self {
        Self {
            start,
            end,
            n_steps,
        }
    }

    /// A scheduler fixed at `v`.
    pub fn constant(v: f32) -> Self {
        Self::new(v, v, 0)
    }

    /// The value at `step`.
    pub fn value(&self, step: usize) -> f32 {
        if step >= self.n_steps {
            self.end
        } else {
            let d = self.end - self.start;
            let v = self.start + d * (step as f32 / self.n_steps as f32);
            // rounding must not step past the end value
            if d >= 0.0 {
                v.min(self.end)
            } else {
                v.max(self.end)
            }
        }
    }
}

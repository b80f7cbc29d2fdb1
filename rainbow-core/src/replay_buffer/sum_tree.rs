//! Sum tree for prioritized sampling.
//!
//! Code is adapted from https://github.com/jaromiru/AI-blog/blob/master/SumTree.py and
//! https://github.com/openai/baselines/blob/master/baselines/deepq/replay_buffer.py
use rand::Rng;
use segment_tree::{ops::MaxIgnoreNaN, SegmentPoint};

#[derive(Debug)]
pub struct SumTree {
    eps: f32,
    alpha: f32,
    capacity: usize,
    n_samples: usize,
    tree: Vec<f32>,
    max_tree: SegmentPoint<f32, MaxIgnoreNaN>,
}

impl SumTree {
    pub fn new(capacity: usize, alpha: f32, eps: f32) -> Self {
        Self {
            eps,
            alpha,
            capacity,
            n_samples: 0,
            tree: vec![0f32; 2 * capacity - 1],
            max_tree: SegmentPoint::build(vec![0f32; capacity], MaxIgnoreNaN),
        }
    }

    fn propagate(&mut self, mut ix: usize, change: f32) {
        while ix != 0 {
            ix = (ix - 1) / 2;
            self.tree[ix] += change;
        }
    }

    fn retrieve(&self, mut ix: usize, mut s: f32) -> usize {
        loop {
            let left = 2 * ix + 1;
            let right = left + 1;

            if left >= self.tree.len() {
                return ix;
            }

            if s <= self.tree[left] || self.tree[right] == 0f32 {
                ix = left;
            } else {
                s -= self.tree[left];
                ix = right;
            }
        }
    }

    /// Sum of all priorities.
    pub fn total(&self) -> f32 {
        self.tree[0]
    }

    /// The number of leaves holding a priority.
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// The largest priority stored, `1` while the tree is empty.
    pub fn max(&self) -> f32 {
        if self.n_samples == 0 {
            1f32
        } else {
            self.max_tree.query(0, self.n_samples)
        }
    }

    /// Priority at `ix`.
    pub fn priority(&self, ix: usize) -> f32 {
        self.tree[ix + self.capacity - 1]
    }

    /// Stores the priority of a new sample at `ix` with the maximum priority
    /// seen so far.
    pub fn add(&mut self, ix: usize) {
        debug_assert!(ix <= self.n_samples || self.n_samples == self.capacity);
        let p = self.max();
        self.set(ix, p);

        if self.n_samples < self.capacity {
            self.n_samples += 1;
        }
    }

    /// Updates the priority at `ix` from the magnitude of a TD error.
    ///
    /// The stored priority is `(|td_err| + eps)^alpha`.
    pub fn update(&mut self, ix: usize, td_err: f32) {
        let p = (td_err.abs() + self.eps).powf(self.alpha);
        self.set(ix, p);
    }

    fn set(&mut self, ix: usize, p: f32) {
        debug_assert!(ix < self.capacity);
        self.max_tree.modify(ix, p);
        let ix = ix + self.capacity - 1;
        let change = p - self.tree[ix];
        self.tree[ix] = p;
        self.propagate(ix, change);
    }

    /// Index of the leaf where the cumulative sum of priorities reaches `s`.
    pub fn get(&self, s: f32) -> usize {
        let ix = self.retrieve(0, s);
        debug_assert!(ix >= (self.capacity - 1));
        // float error can walk past the last filled leaf
        (ix + 1 - self.capacity).min(self.n_samples.saturating_sub(1))
    }

    /// Samples indices proportionally to their priorities.
    pub fn sample<R: Rng>(&self, batch_size: usize, rng: &mut R) -> Vec<usize> {
        let p_sum = self.total();
        (0..batch_size)
            .map(|_| self.get(p_sum * rng.gen::<f32>()))
            .collect()
    }
}

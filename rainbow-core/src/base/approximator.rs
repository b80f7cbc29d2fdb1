//! Function approximator interface.
use anyhow::Result;
use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};

/// Output of an [`Approximator`] for a batch of observations.
#[derive(Clone, Debug, PartialEq)]
pub enum QValues {
    /// Action values, shape `[batch, n_actions]`.
    Scalar(Array2<f32>),

    /// Probabilities over a fixed support, shape `[batch, n_actions, n_atoms]`.
    Categorical(Array3<f32>),
}

impl QValues {
    /// The number of samples in the batch.
    pub fn batch_size(&self) -> usize {
        match self {
            Self::Scalar(q) => q.nrows(),
            Self::Categorical(p) => p.len_of(Axis(0)),
        }
    }

    /// The number of actions.
    pub fn n_actions(&self) -> usize {
        match self {
            Self::Scalar(q) => q.ncols(),
            Self::Categorical(p) => p.len_of(Axis(1)),
        }
    }
}

/// Values to be regressed for the taken actions.
#[derive(Clone, Debug, PartialEq)]
pub enum TargetValues {
    /// `y` per sample, trained with the Huber loss.
    Scalar(Array1<f32>),

    /// Projected target distribution per sample, shape `[batch, n_atoms]`,
    /// trained with the cross-entropy loss.
    Categorical(Array2<f32>),
}

/// Target of a gradient step.
#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    /// Taken actions; the loss only involves outputs at these indices.
    pub actions: Vec<usize>,

    /// Target values.
    pub values: TargetValues,

    /// Per-sample loss weights, given in prioritized replay.
    pub weights: Option<Vec<f32>>,
}

/// A trainable mapping from observations to Q-values or value distributions.
///
/// Observations are passed already normalized, one row per sample.
/// The network architecture and the optimizer are up to the implementor.
pub trait Approximator {
    /// The number of actions.
    fn n_actions(&self) -> usize;

    /// Evaluates the network.
    fn forward(&mut self, obs: ArrayView2<f32>) -> Result<QValues>;

    /// Greedy action for each sample.
    ///
    /// For categorical outputs this is the argmax of the expected value.
    fn greedy_action(&mut self, obs: ArrayView2<f32>) -> Result<Vec<usize>>;

    /// Performs a gradient step towards `target`.
    fn apply_gradient(&mut self, obs: ArrayView2<f32>, target: &Target) -> Result<()>;

    /// Copies the parameters of `online` into `self`.
    fn sync_from(&mut self, online: &Self) -> Result<()>
    where
        Self: Sized;

    /// Turns parameter noise on or off (noisy networks).
    ///
    /// Approximators without parameter noise ignore this call.
    fn set_noise(&mut self, _enabled: bool) {}
}

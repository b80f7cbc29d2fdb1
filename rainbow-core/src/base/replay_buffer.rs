//! Replay buffer interface.
use super::{SampledBatch, TransitionBatch};
use anyhow::Result;

/// Interface of replay buffers used by the training loop.
///
/// Implementations may sample uniformly or by priority. A prioritized buffer
/// fills [`SampledBatch::priorities`] and honors
/// [`ReplayBufferBase::update_priority`]; a uniform one leaves it `None` and
/// ignores the updates.
pub trait ReplayBufferBase {
    /// Configuration of the buffer.
    type Config: Clone;

    /// Builds a replay buffer.
    fn build(config: &Self::Config) -> Self;

    /// Pushes transitions into the buffer.
    fn push(&mut self, tr: TransitionBatch) -> Result<()>;

    /// The number of transitions stored.
    fn len(&self) -> usize;

    /// Returns `true` if no transition is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples a batch of `size` transitions.
    fn batch(&mut self, size: usize) -> Result<SampledBatch>;

    /// Overwrites the priorities of the transitions at `ixs` with ones derived
    /// from the magnitudes `td_errs`.
    fn update_priority(&mut self, ixs: &[usize], td_errs: &[f32]) -> Result<()>;
}

//! Batched environment.
use super::Round;
use anyhow::Result;

/// N environment instances advanced together in rounds.
///
/// The calling order is `reset`, `get_state`, then any number of
/// `take_action`/`get_state` pairs. `take_action` only dispatches; the round is
/// complete when `get_state` returns.
pub trait BatchEnv {
    /// The number of environment instances.
    fn n_procs(&self) -> usize;

    /// Resets every instance. The reset observations are collected by the next
    /// [`BatchEnv::get_state`].
    fn reset(&mut self) -> Result<()>;

    /// Dispatches `act[i]` to instance `i` without waiting for completion.
    fn take_action(&mut self, act: &[u8]) -> Result<()>;

    /// Blocks until every instance has finished the dispatched command and
    /// returns a copy of the round.
    fn get_state(&mut self) -> Result<Round>;
}

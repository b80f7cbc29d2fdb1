//! Worker thread driving one game instance.
use crate::{Connector, EnvError};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Commands from [`PipeBatchEnv`](crate::PipeBatchEnv) to a worker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Command {
    Act(u8),
    Reset,
    Close,
}

/// The latest transition of a worker.
#[derive(Clone, Debug, Default)]
pub(crate) struct WorkerSlot {
    pub old_obs: Vec<u8>,
    pub act: u8,
    pub reward: i32,
    pub new_obs: Vec<u8>,
    pub is_terminal: bool,
    pub episode_step: usize,
}

/// Slots of all workers, indexed by worker id.
pub(crate) type Slots = Arc<Vec<Mutex<WorkerSlot>>>;

pub(crate) fn lock_slot(slots: &Slots, id: usize) -> MutexGuard<'_, WorkerSlot> {
    slots[id].lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct Worker<C> {
    id: usize,
    connector: C,
    max_episode_length: usize,
    episode_step: usize,
    slots: Slots,
}

impl<C: Connector> Worker<C> {
    pub fn new(id: usize, connector: C, max_episode_length: usize, slots: Slots) -> Self {
        Self {
            id,
            connector,
            max_episode_length,
            episode_step: 0,
            slots,
        }
    }

    fn reset(&mut self) -> Result<(), EnvError> {
        debug!("Worker {} resets", self.id);
        let obs = self.connector.reset()?;
        self.episode_step = 0;

        let mut slot = lock_slot(&self.slots, self.id);
        slot.old_obs = obs.clone();
        slot.act = 0;
        slot.reward = 0;
        slot.new_obs = obs;
        slot.is_terminal = false;
        slot.episode_step = 0;
        Ok(())
    }

    fn act(&mut self, act: u8) -> Result<(), EnvError> {
        let old_obs = self
            .connector
            .current()
            .ok_or(EnvError::NotReset)?
            .to_vec();
        let reply = self.connector.step(act)?;
        self.episode_step += 1;

        let mut is_terminal = reply.is_terminal;
        if self.episode_step > self.max_episode_length {
            debug!("Worker {} cuts an episode at {} steps", self.id, self.episode_step);
            is_terminal = true;
        }

        // The published observation is the one that ended the episode, not the reset frame.
        let episode_step = self.episode_step;
        if is_terminal {
            self.connector.reset()?;
            self.episode_step = 0;
        }

        let mut slot = lock_slot(&self.slots, self.id);
        slot.old_obs = old_obs;
        slot.act = act;
        slot.reward = reply.reward;
        slot.new_obs = reply.obs;
        slot.is_terminal = is_terminal;
        slot.episode_step = if is_terminal { 0 } else { episode_step };
        Ok(())
    }

    /// Serves commands until [`Command::Close`], a failure, or the command
    /// channel is dropped.
    ///
    /// Each finished command is signalled on `ready`. A failure is sent in
    /// place of the signal and ends the worker.
    pub fn run(mut self, commands: Receiver<Command>, ready: Sender<Result<(), EnvError>>) {
        info!("Starts worker {}", self.id);

        for command in commands.iter() {
            let res = match command {
                Command::Act(act) => self.act(act),
                Command::Reset => self.reset(),
                Command::Close => break,
            };

            match res {
                Ok(()) => {
                    if ready.send(Ok(())).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Worker {} failed: {}", self.id, e);
                    let _ = ready.send(Err(e));
                    break;
                }
            }
        }

        if let Err(e) = self.connector.close() {
            warn!("Worker {} could not close its game instance: {}", self.id, e);
        }
        info!("Stopped worker {}", self.id);
    }
}

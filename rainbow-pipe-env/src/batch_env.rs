//! N game instances stepped in lock-step rounds.
use crate::{
    worker::{lock_slot, Command, Slots, Worker, WorkerSlot},
    Connector, EnvError, FrameLayout, KillSwitch, PipeEnvConfig, ProcessConnector,
};
use anyhow::Result;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use ndarray::Array2;
use rainbow_core::{BatchEnv, Round};
use std::{
    sync::{Arc, Mutex},
    thread::JoinHandle,
    time::{Duration, Instant},
};

/// Runs each game instance on its own worker thread and synchronizes them in
/// rounds.
///
/// A round is started by [`PipeBatchEnv::reset`] or
/// [`PipeBatchEnv::take_action`], which return without waiting, and is
/// collected by [`PipeBatchEnv::get_state`]. At most one round is in flight.
///
/// Errors are not recovered from. After a failed round the instances are
/// killed and every call but [`PipeBatchEnv::close`] returns
/// [`EnvError::Failed`].
pub struct PipeBatchEnv {
    n_procs: usize,
    layout: FrameLayout,
    round_timeout: Option<Duration>,
    close_timeout: Duration,

    /// Command senders, one per worker.
    commands: Vec<Sender<Command>>,

    /// Completion signals, one per worker, holding at most one token.
    ready: Vec<Receiver<Result<(), EnvError>>>,

    slots: Slots,
    threads: Vec<JoinHandle<()>>,
    kill_switches: Vec<Option<KillSwitch>>,
    in_flight: bool,
    is_reset: bool,
    failed: bool,
    closed: bool,
}

impl PipeBatchEnv {
    /// Spawns `config.n_procs` instances of `config.program`.
    pub fn build(config: &PipeEnvConfig) -> Result<Self, EnvError> {
        Self::build_with(config, |_| {
            ProcessConnector::spawn(&config.program, &config.args, config.layout.clone())
        })
    }

    /// Builds the environment with connectors made by `factory`, called with
    /// the worker index on the caller's thread.
    pub fn build_with<C, F>(config: &PipeEnvConfig, mut factory: F) -> Result<Self, EnvError>
    where
        C: Connector + 'static,
        F: FnMut(usize) -> Result<C, EnvError>,
    {
        let n_procs = config.n_procs;
        let connectors = (0..n_procs).map(&mut factory).collect::<Result<Vec<_>, _>>()?;
        let slots: Slots = Arc::new(
            (0..n_procs)
                .map(|_| Mutex::new(WorkerSlot::default()))
                .collect(),
        );

        let mut commands = vec![];
        let mut ready = vec![];
        let mut threads = vec![];
        let mut kill_switches = vec![];
        for (id, connector) in connectors.into_iter().enumerate() {
            kill_switches.push(connector.kill_switch());
            let (s_cmd, r_cmd) = unbounded();
            let (s_ready, r_ready) = bounded(1);
            let worker = Worker::new(id, connector, config.max_episode_length, slots.clone());
            let handle = std::thread::Builder::new()
                .name(format!("pipe-env-worker-{}", id))
                .spawn(move || worker.run(r_cmd, s_ready))?;
            commands.push(s_cmd);
            ready.push(r_ready);
            threads.push(handle);
        }
        info!("Started {} workers", n_procs);

        Ok(Self {
            n_procs,
            layout: config.layout.clone(),
            round_timeout: config.round_timeout(),
            close_timeout: Duration::from_millis(config.close_timeout_ms),
            commands,
            ready,
            slots,
            threads,
            kill_switches,
            in_flight: false,
            is_reset: false,
            failed: false,
            closed: false,
        })
    }

    /// The number of instances.
    pub fn n_procs(&self) -> usize {
        self.n_procs
    }

    /// Layout of observations.
    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Kills the instances and refuses further rounds.
    fn fail(&mut self, e: EnvError) -> EnvError {
        error!("Round failed, killing {} instances: {}", self.n_procs, e);
        self.failed = true;
        self.in_flight = false;
        self.kill_all();
        e
    }

    fn kill_all(&self) {
        for kill_switch in self.kill_switches.iter().flatten() {
            kill_switch.kill();
        }
    }

    fn broadcast(&mut self, commands: impl Iterator<Item = Command>) -> Result<(), EnvError> {
        let mut disconnected = None;
        for (id, (sender, command)) in self.commands.iter().zip(commands).enumerate() {
            if sender.send(command).is_err() {
                disconnected = Some(id);
                break;
            }
        }
        match disconnected {
            Some(id) => Err(self.fail(EnvError::WorkerDisconnected(id))),
            None => {
                self.in_flight = true;
                Ok(())
            }
        }
    }

    /// Resets every instance.
    pub fn reset(&mut self) -> Result<(), EnvError> {
        if self.failed {
            return Err(EnvError::Failed);
        }
        if self.in_flight {
            return Err(EnvError::RoundInFlight);
        }
        debug!("Resets {} instances", self.n_procs);
        self.broadcast(std::iter::repeat(Command::Reset))?;
        self.is_reset = true;
        Ok(())
    }

    /// Dispatches `act[i]` to instance `i`.
    pub fn take_action(&mut self, act: &[u8]) -> Result<(), EnvError> {
        if act.len() != self.n_procs {
            return Err(EnvError::ActionCountMismatch {
                expected: self.n_procs,
                got: act.len(),
            });
        }
        if self.failed {
            return Err(EnvError::Failed);
        }
        if self.in_flight {
            return Err(EnvError::RoundInFlight);
        }
        if !self.is_reset {
            return Err(EnvError::NotReset);
        }
        self.broadcast(act.iter().map(|&a| Command::Act(a)))
    }

    fn wait(&self, id: usize) -> Result<(), EnvError> {
        match self.round_timeout {
            Some(timeout) => self.ready[id].recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => EnvError::WorkerTimeout(id),
                RecvTimeoutError::Disconnected => EnvError::WorkerDisconnected(id),
            })?,
            None => self.ready[id]
                .recv()
                .map_err(|_| EnvError::WorkerDisconnected(id))?,
        }
    }

    /// Waits for every worker to finish the round in flight and returns a copy
    /// of their slots.
    pub fn get_state(&mut self) -> Result<Round, EnvError> {
        if self.failed {
            return Err(EnvError::Failed);
        }
        if !self.in_flight {
            return Err(EnvError::NoRoundInFlight);
        }
        for id in 0..self.n_procs {
            if let Err(e) = self.wait(id) {
                return Err(self.fail(e));
            }
        }
        self.in_flight = false;

        let n = self.n_procs;
        let m = self.layout.len();
        let mut old_obs = Vec::with_capacity(n * m);
        let mut new_obs = Vec::with_capacity(n * m);
        let mut act = Vec::with_capacity(n);
        let mut reward = Vec::with_capacity(n);
        let mut is_terminal = Vec::with_capacity(n);
        let mut episode_step = Vec::with_capacity(n);

        for id in 0..n {
            let slot = lock_slot(&self.slots, id);
            old_obs.extend_from_slice(&slot.old_obs);
            new_obs.extend_from_slice(&slot.new_obs);
            act.push(slot.act);
            reward.push(slot.reward);
            is_terminal.push(slot.is_terminal);
            episode_step.push(slot.episode_step);
        }

        let to_array = |buf: Vec<u8>| {
            Array2::from_shape_vec((n, m), buf).map_err(|e| {
                EnvError::ProtocolDesync(format!("observations do not match the layout: {}", e))
            })
        };

        let (old_obs, new_obs) = match (to_array(old_obs), to_array(new_obs)) {
            (Ok(old_obs), Ok(new_obs)) => (old_obs, new_obs),
            (Err(e), _) | (_, Err(e)) => return Err(self.fail(e)),
        };

        Ok(Round {
            old_obs,
            act,
            reward,
            new_obs,
            is_terminal,
            episode_step,
        })
    }

    /// Waits until worker `id` has stopped, `false` if `deadline` passes
    /// first. Leftover completion signals are discarded.
    fn wait_stopped(&self, id: usize, deadline: Instant) -> bool {
        loop {
            match self.ready[id].recv_deadline(deadline) {
                Ok(_) => continue,
                Err(RecvTimeoutError::Disconnected) => return true,
                Err(RecvTimeoutError::Timeout) => return false,
            }
        }
    }

    /// Stops the workers and closes the game instances.
    ///
    /// Workers are asked to stop and given `close_timeout` to do so. An
    /// instance whose worker is still running after that is killed, and the
    /// worker is left detached if it does not stop within another
    /// `close_timeout`.
    pub fn close(&mut self) -> Result<(), EnvError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        for sender in self.commands.iter() {
            let _ = sender.send(Command::Close);
        }

        let deadline = Instant::now() + self.close_timeout;
        let threads = self.threads.drain(..).collect::<Vec<_>>();
        let mut n_detached = 0;
        for (id, handle) in threads.into_iter().enumerate() {
            let mut stopped = self.wait_stopped(id, deadline);
            if !stopped {
                if let Some(kill_switch) = &self.kill_switches[id] {
                    kill_switch.kill();
                }
                stopped = self.wait_stopped(id, Instant::now() + self.close_timeout);
            }

            if !stopped {
                warn!("Worker {} does not stop, leaving it detached", id);
                n_detached += 1;
            } else if handle.join().is_err() {
                warn!("Worker {} panicked", id);
            }
        }
        info!("Closed {} workers, {} detached", self.n_procs, n_detached);
        Ok(())
    }
}

impl BatchEnv for PipeBatchEnv {
    fn n_procs(&self) -> usize {
        self.n_procs
    }

    fn reset(&mut self) -> Result<()> {
        Ok(PipeBatchEnv::reset(self)?)
    }

    fn take_action(&mut self, act: &[u8]) -> Result<()> {
        Ok(PipeBatchEnv::take_action(self, act)?)
    }

    fn get_state(&mut self) -> Result<Round> {
        Ok(PipeBatchEnv::get_state(self)?)
    }
}

impl Drop for PipeBatchEnv {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close the environment: {}", e);
        }
    }
}

//! A game instance running as a child process.
use super::{Connector, KillSwitch, StepReply, WireConnector};
use crate::{EnvError, FrameLayout};
use log::{info, warn};
use std::{
    io::{self, BufReader},
    process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread,
    time::Duration,
};

/// Interval between checks of a terminating child.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Spawns a game program and speaks the protocol over its stdin/stdout.
///
/// The child is killed on drop unless [`Connector::close`] succeeded.
pub struct ProcessConnector {
    child: Arc<Mutex<Child>>,
    pid: u32,
    wire: WireConnector<BufReader<ChildStdout>, ChildStdin>,
    closed: bool,
}

fn lock_child(child: &Mutex<Child>) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ProcessConnector {
    /// Spawns `program` with `args`. Its stderr is inherited.
    pub fn spawn(program: &str, args: &[String], layout: FrameLayout) -> Result<Self, EnvError> {
        let spawn_err = |source: io::Error| EnvError::Spawn {
            program: program.to_string(),
            source,
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(spawn_err)?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(spawn_err(io::Error::new(
                    io::ErrorKind::Other,
                    "stdio is not piped",
                )));
            }
        };
        let pid = child.id();
        info!("Spawned {} (pid {})", program, pid);

        Ok(Self {
            child: Arc::new(Mutex::new(child)),
            pid,
            wire: WireConnector::new(BufReader::new(stdout), stdin, layout),
            closed: false,
        })
    }

    /// Waits for the child without holding its lock, so that a kill switch
    /// can still reach it.
    fn wait(&self) -> io::Result<ExitStatus> {
        loop {
            if let Some(status) = lock_child(&self.child).try_wait()? {
                return Ok(status);
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }
}

impl Connector for ProcessConnector {
    fn reset(&mut self) -> Result<Vec<u8>, EnvError> {
        self.wire.reset()
    }

    fn step(&mut self, action: u8) -> Result<StepReply, EnvError> {
        self.wire.step(action)
    }

    fn current(&self) -> Option<&[u8]> {
        self.wire.current()
    }

    fn close(&mut self) -> Result<(), EnvError> {
        if self.closed {
            return Ok(());
        }
        self.wire.close()?;
        let status = self.wait()?;
        self.closed = true;
        if !status.success() {
            warn!("Game instance {} exited with {}", self.pid, status);
        }
        Ok(())
    }

    fn kill_switch(&self) -> Option<KillSwitch> {
        let child = self.child.clone();
        let pid = self.pid;
        Some(KillSwitch::new(move || {
            let mut child = lock_child(&child);
            if let Ok(None) = child.try_wait() {
                warn!("Kills game instance {}", pid);
                let _ = child.kill();
                let _ = child.wait();
            }
        }))
    }
}

impl Drop for ProcessConnector {
    fn drop(&mut self) {
        if !self.closed {
            let mut child = lock_child(&self.child);
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

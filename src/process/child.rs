//! # Shared child handle: reaping and signalling under one lock.
//!
//! ```text
//!                 Arc<Mutex<Child>>
//!        ┌──────────────┴──────────────┐
//!   reap(): try_wait()            ChildSignaller: id()? ─► SIGTERM / start_kill()
//!   woken by SIGCHLD or tick
//! ```
//!
//! A pid is released by the kernel only when the child is reaped, and reaping
//! happens only while the lock is held. Once reaped, `Child::id()` is `None`
//! and the signaller reports [`SignalError::AlreadyExited`] without touching
//! the pid, so a recycled pid can never receive a signal meant for a worker.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::process::Child;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::warn;

use crate::error::SignalError;
use crate::process::spawner::{ExitStatus, Signaller};

/// Fallback poll period when SIGCHLD is unavailable or coalesced away.
const REAP_POLL: Duration = Duration::from_millis(100);

pub(crate) type SharedChild = Arc<Mutex<Child>>;

fn lock(child: &SharedChild) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Resolves once the child has been reaped.
pub(crate) async fn reap(child: SharedChild, pid: u32) -> ExitStatus {
    let mut wakeup = Wakeup::new(pid);
    loop {
        let polled = lock(&child).try_wait();
        match polled {
            Ok(Some(status)) => return ExitStatus::from(status),
            Ok(None) => {}
            Err(e) => {
                warn!(pid, error = %e, "failed to wait for worker process");
                return ExitStatus::unknown();
            }
        }
        wakeup.next().await;
    }
}

struct Wakeup {
    #[cfg(unix)]
    sigchld: Option<tokio::signal::unix::Signal>,
    tick: Interval,
}

impl Wakeup {
    fn new(pid: u32) -> Self {
        let mut tick = tokio::time::interval(REAP_POLL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        #[cfg(unix)]
        let sigchld = {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::child()) {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!(pid, error = %e, "no SIGCHLD stream, polling for exit");
                    None
                }
            }
        };
        #[cfg(not(unix))]
        let _ = pid;

        Self {
            #[cfg(unix)]
            sigchld,
            tick,
        }
    }

    async fn next(&mut self) {
        #[cfg(unix)]
        if let Some(sig) = self.sigchld.as_mut() {
            let closed = tokio::select! {
                got = sig.recv() => got.is_none(),
                _ = self.tick.tick() => false,
            };
            if closed {
                self.sigchld = None;
            }
            return;
        }
        self.tick.tick().await;
    }
}

/// [`Signaller`] for a child spawned by [`CommandSpawner`](crate::CommandSpawner).
#[derive(Debug)]
pub struct ChildSignaller {
    pid: u32,
    child: SharedChild,
}

impl ChildSignaller {
    pub(crate) fn new(child: SharedChild, pid: u32) -> Self {
        Self { pid, child }
    }

    /// Pid the child was started with.
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Signaller for ChildSignaller {
    fn terminate(&self) -> Result<(), SignalError> {
        let child = lock(&self.child);
        match child.id() {
            Some(pid) => send_term(pid),
            None => Err(SignalError::AlreadyExited { pid: self.pid }),
        }
    }

    fn kill(&self) -> Result<(), SignalError> {
        let mut child = lock(&self.child);
        if child.id().is_none() {
            return Err(SignalError::AlreadyExited { pid: self.pid });
        }
        child.start_kill().map_err(|e| SignalError::Os {
            pid: self.pid,
            signal: "SIGKILL",
            reason: e.to_string(),
        })
    }
}

#[cfg(unix)]
fn send_term(pid: u32) -> Result<(), SignalError> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|_| SignalError::Os {
        pid,
        signal: "SIGTERM",
        reason: "pid out of range".into(),
    })?;

    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => Err(SignalError::AlreadyExited { pid }),
        Err(errno) => Err(SignalError::Os {
            pid,
            signal: "SIGTERM",
            reason: errno.desc().to_string(),
        }),
    }
}

#[cfg(not(unix))]
fn send_term(_pid: u32) -> Result<(), SignalError> {
    Err(SignalError::Unsupported)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::process::Command;

    fn shell(script: &str) -> (SharedChild, u32) {
        let child = Command::new("/bin/sh")
            .arg("-c")
            .arg(script)
            .spawn()
            .expect("spawn sh");
        let pid = child.id().expect("pid");
        (Arc::new(Mutex::new(child)), pid)
    }

    #[tokio::test]
    async fn reaped_child_is_never_signalled() {
        let (child, pid) = shell("exit 4");
        assert_eq!(reap(child.clone(), pid).await, ExitStatus::exited(4));

        let sig = ChildSignaller::new(child, pid);
        assert_eq!(sig.terminate(), Err(SignalError::AlreadyExited { pid }));
        assert_eq!(sig.kill(), Err(SignalError::AlreadyExited { pid }));
    }

    #[tokio::test]
    async fn kill_goes_through_the_handle() {
        let (child, pid) = shell("exec sleep 30");
        let sig = ChildSignaller::new(child.clone(), pid);

        sig.kill().expect("sigkill");
        assert_eq!(reap(child, pid).await, ExitStatus::signaled(9));
    }
}

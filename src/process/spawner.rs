//! # Spawn seam between the supervisor and the operating system.
//!
//! The supervisor never touches `Command` or `kill(2)` directly. It asks a
//! [`Spawner`] for a new worker and gets back a [`Spawned`] bundle:
//!
//! ```text
//! Spawner::spawn(&SpawnRequest { slot, worker })
//!        └─► Spawned {
//!              pid,                       identity for logs/events
//!              signaller: Box<dyn Signaller>   graceful / forceful stop
//!              exit: ExitFuture           resolves once, when the process is gone
//!            }
//! ```
//!
//! Production code uses [`CommandSpawner`](crate::CommandSpawner); tests inject
//! a fake that records every signal it receives.

use std::fmt;

use futures::future::BoxFuture;

use crate::core::WorkerId;
use crate::error::{SignalError, SpawnError};

/// What the supervisor asks for when it needs a worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpawnRequest {
    /// Pool position being filled (`0..target`). Replacements reuse the slot.
    pub slot: usize,
    /// Fresh, never-reused identity for this worker.
    pub worker: WorkerId,
}

/// How a worker process ended.
///
/// On Unix a process either exits with a code or is terminated by a signal;
/// exactly one of the two is normally set. Both are `None` when the exit
/// could not be observed (e.g. `wait` failed).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExitStatus {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal number, if killed by a signal.
    pub signal: Option<i32>,
}

impl ExitStatus {
    /// Normal exit with `code`.
    pub const fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Terminated by signal `signo`.
    pub const fn signaled(signo: i32) -> Self {
        Self {
            code: None,
            signal: Some(signo),
        }
    }

    /// Exit status could not be determined.
    pub const fn unknown() -> Self {
        Self {
            code: None,
            signal: None,
        }
    }

    /// True for a normal exit with code 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(sig)) => write!(f, "signal {sig}"),
            (None, None) => f.write_str("unknown exit"),
        }
    }
}

/// Future resolving to the worker's exit status. Polled by the supervisor's exit watcher.
pub type ExitFuture = BoxFuture<'static, ExitStatus>;

/// Sends stop requests to one worker process.
pub trait Signaller: Send + Sync {
    /// Ask the process to stop, letting in-flight work finish (SIGTERM).
    fn terminate(&self) -> Result<(), SignalError>;

    /// Stop the process immediately (SIGKILL).
    fn kill(&self) -> Result<(), SignalError>;
}

/// A freshly started worker process.
pub struct Spawned {
    /// OS process id.
    pub pid: u32,
    /// Signal delivery for this process.
    pub signaller: Box<dyn Signaller>,
    /// Resolves when the process has exited.
    pub exit: ExitFuture,
}

impl fmt::Debug for Spawned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spawned").field("pid", &self.pid).finish_non_exhaustive()
    }
}

/// Creates worker processes.
///
/// Called only from the supervisor's control loop, one request at a time.
/// Implementations must not block for long: spawning is part of the
/// exit-handling path and delays every other control event.
pub trait Spawner: Send + Sync + 'static {
    /// Start one worker for `req.slot`.
    fn spawn(&self, req: &SpawnRequest) -> Result<Spawned, SpawnError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefers_code() {
        assert_eq!(ExitStatus::exited(1).to_string(), "exit code 1");
        assert_eq!(ExitStatus::signaled(9).to_string(), "signal 9");
        assert_eq!(ExitStatus::unknown().to_string(), "unknown exit");
    }

    #[test]
    fn only_zero_code_is_success() {
        assert!(ExitStatus::exited(0).success());
        assert!(!ExitStatus::exited(2).success());
        assert!(!ExitStatus::signaled(15).success());
    }

    #[cfg(unix)]
    #[test]
    fn converts_std_status() {
        use std::os::unix::process::ExitStatusExt;

        let st = ExitStatus::from(std::process::ExitStatus::from_raw(9));
        assert_eq!(st, ExitStatus::signaled(9));

        let st = ExitStatus::from(std::process::ExitStatus::from_raw(3 << 8));
        assert_eq!(st, ExitStatus::exited(3));
    }
}

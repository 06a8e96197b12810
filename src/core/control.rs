//! Control events consumed by the supervisor's single control loop.
//!
//! Everything that can change supervisor state arrives here as a value:
//! exit watchers, the OS signal listener, respawn timers and
//! [`SupervisorHandle`](crate::SupervisorHandle) only *send*.

use crate::core::state::WorkerId;
use crate::process::ExitStatus;

/// What triggered a shutdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM (orchestrator / `kill`).
    Terminate,
    /// SIGINT.
    Interrupt,
    /// SIGQUIT.
    Quit,
    /// Ctrl-C on platforms without Unix signals.
    CtrlC,
    /// Requested through [`SupervisorHandle::shutdown`](crate::SupervisorHandle::shutdown).
    Manual,
}

impl ShutdownSignal {
    /// Stable name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownSignal::Terminate => "SIGTERM",
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Quit => "SIGQUIT",
            ShutdownSignal::CtrlC => "ctrl-c",
            ShutdownSignal::Manual => "manual",
        }
    }
}

/// Tagged union of everything the control loop reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    /// A worker process has exited.
    WorkerExited {
        /// Which worker.
        id: WorkerId,
        /// How it ended.
        status: ExitStatus,
    },
    /// Termination requested.
    ShutdownRequested {
        /// Trigger.
        signal: ShutdownSignal,
    },
    /// The current drain (or reap) deadline elapsed.
    DrainTimedOut,
    /// A deferred replacement for `slot` is due.
    RespawnDue {
        /// Slot to fill.
        slot: usize,
    },
}

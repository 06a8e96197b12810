//! Error types used by the procvisor runtime, spawners and workers.
//!
//! - [`RuntimeError`] errors raised by the supervisor itself (config, startup, signals).
//! - [`SpawnError`] a worker process could not be created.
//! - [`SignalError`] a signal could not be delivered to a worker process.
//! - [`WorkerError`] errors returned by a worker entry point.
//!
//! The enums provide `as_label` helpers (stable snake_case strings for logs/metrics).

use std::path::PathBuf;

use thiserror::Error;

/// # Errors produced by the supervisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration value could not be parsed or is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with it.
        reason: String,
    },

    /// A worker could not be spawned while the pool was being filled.
    ///
    /// Fatal: workers already started are force-killed before this is returned.
    #[error("failed to spawn worker for slot {slot} at startup: {source}")]
    StartupSpawn {
        /// Slot that failed to fill.
        slot: usize,
        /// Underlying spawn failure.
        #[source]
        source: SpawnError,
    },

    /// The spawner itself could not be prepared (e.g. current executable unknown).
    #[error("failed to prepare worker spawner: {0}")]
    SpawnerSetup(#[source] SpawnError),

    /// OS signal listeners could not be installed.
    #[error("failed to install signal handlers: {0}")]
    SignalSetup(#[source] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use procvisor::RuntimeError;
    ///
    /// let err = RuntimeError::InvalidConfig { reason: "nope".into() };
    /// assert_eq!(err.as_label(), "runtime_invalid_config");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::InvalidConfig { .. } => "runtime_invalid_config",
            RuntimeError::StartupSpawn { .. } => "runtime_startup_spawn",
            RuntimeError::SpawnerSetup(_) => "runtime_spawner_setup",
            RuntimeError::SignalSetup(_) => "runtime_signal_setup",
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        RuntimeError::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// # Errors produced while creating a worker process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SpawnError {
    /// The OS refused to start the program.
    #[error("failed to start {program:?}: {source}")]
    Io {
        /// Program that was being started.
        program: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The child started but reported no process id (already reaped).
    #[error("spawned process has no pid")]
    NoPid,

    /// The spawner declined to create a worker.
    #[error("spawn rejected: {reason}")]
    Rejected {
        /// Reason given by the spawner.
        reason: String,
    },

    /// The spawner panicked; the panic was contained by the supervisor.
    #[error("spawner panicked: {info}")]
    Panicked {
        /// Panic payload, if it was a string.
        info: String,
    },
}

impl SpawnError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SpawnError::Io { .. } => "spawn_io",
            SpawnError::NoPid => "spawn_no_pid",
            SpawnError::Rejected { .. } => "spawn_rejected",
            SpawnError::Panicked { .. } => "spawn_panicked",
        }
    }
}

/// # Errors produced while signalling a worker process.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// The process no longer exists (`ESRCH`); its exit is about to be reported.
    #[error("process {pid} already exited")]
    AlreadyExited {
        /// Target pid.
        pid: u32,
    },

    /// The OS rejected the signal.
    #[error("failed to send {signal} to process {pid}: {reason}")]
    Os {
        /// Target pid.
        pid: u32,
        /// Signal name (`SIGTERM`, `SIGKILL`).
        signal: &'static str,
        /// OS error description.
        reason: String,
    },

    /// Signalling by pid is not supported on this platform.
    #[error("signalling processes is not supported on this platform")]
    Unsupported,
}

impl SignalError {
    /// True when the target was already gone, which is not a real failure.
    pub fn is_already_exited(&self) -> bool {
        matches!(self, SignalError::AlreadyExited { .. })
    }
}

/// # Errors returned by a worker entry point.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker failed; the supervisor may replace it.
    #[error("worker failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Worker hit a non-recoverable condition (bad config, port in use, ...).
    #[error("fatal worker error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Worker noticed cancellation and stopped; treated as a clean exit.
    #[error("worker cancelled")]
    Canceled,
}

impl WorkerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Fail { .. } => "worker_failed",
            WorkerError::Fatal { .. } => "worker_fatal",
            WorkerError::Canceled => "worker_canceled",
        }
    }

    /// Indicates whether the error is fatal.
    ///
    /// # Example
    /// ```
    /// use procvisor::WorkerError;
    ///
    /// assert!(WorkerError::Fatal { error: "port in use".into() }.is_fatal());
    /// assert!(!WorkerError::Fail { error: "boom".into() }.is_fatal());
    /// ```
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkerError::Fatal { .. })
    }
}

//! # Command-backed spawner.
//!
//! [`CommandSpawner`] starts each worker as a child process with
//! [`tokio::process::Command`] and marks it with [`WORKER_ID_ENV`] so the
//! child can tell it is a worker.
//!
//! Two common setups:
//! - **Re-exec** ([`CommandSpawner::current_exe`]): the binary starts copies of
//!   itself; in the child [`Role::detect`](crate::Role::detect) returns `Worker`.
//! - **External command** ([`CommandSpawner::new`]): any server program, e.g.
//!   `node server.js`, run N times.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tokio::process::Command;

use crate::error::SpawnError;
use crate::process::child::{ChildSignaller, reap};
use crate::process::spawner::{ExitStatus, SpawnRequest, Spawned, Spawner};

/// Environment variable carrying the worker's slot index into the child.
pub const WORKER_ID_ENV: &str = "PROCVISOR_WORKER_ID";

/// Environment variable carrying the worker's unique, never-reused id.
pub const WORKER_GENERATION_ENV: &str = "PROCVISOR_WORKER_GENERATION";

/// Spawns workers as child processes of a fixed program.
#[derive(Clone, Debug)]
pub struct CommandSpawner {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
    quiet_stdout: bool,
}

impl CommandSpawner {
    /// Spawner running `program` for every worker.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            quiet_stdout: false,
        }
    }

    /// Spawner re-executing the running binary.
    pub fn current_exe() -> Result<Self, SpawnError> {
        let program = std::env::current_exe().map_err(|source| SpawnError::Io {
            program: PathBuf::from("<current executable>"),
            source,
        })?;
        Ok(Self::new(program))
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Appends arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Sets an extra environment variable for every worker.
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Discard worker stdout (stderr stays inherited).
    pub fn quiet_stdout(mut self, quiet: bool) -> Self {
        self.quiet_stdout = quiet;
        self
    }

    /// Program every worker runs.
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, req: &SpawnRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .env(WORKER_ID_ENV, req.slot.to_string())
            .env(WORKER_GENERATION_ENV, req.worker.get().to_string())
            .stdin(Stdio::null())
            .stdout(if self.quiet_stdout {
                Stdio::null()
            } else {
                Stdio::inherit()
            })
            .stderr(Stdio::inherit());
        cmd
    }
}

impl Spawner for CommandSpawner {
    fn spawn(&self, req: &SpawnRequest) -> Result<Spawned, SpawnError> {
        let child = self
            .command(req)
            .spawn()
            .map_err(|source| SpawnError::Io {
                program: self.program.clone(),
                source,
            })?;

        let pid = child.id().ok_or(SpawnError::NoPid)?;
        let child = Arc::new(Mutex::new(child));

        Ok(Spawned {
            pid,
            signaller: Box::new(ChildSignaller::new(Arc::clone(&child), pid)),
            exit: reap(child, pid).boxed(),
        })
    }
}

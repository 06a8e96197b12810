//! # One entry point for both roles.
//!
//! ```text
//! process start ──► Role::detect()
//!                     ├─ Primary      → Supervisor (re-exec current binary N times)
//!                     └─ Worker{slot} → run_worker(entry)
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use procvisor::{EntryFn, Outcome, SupervisorConfig, WorkerContext, WorkerError};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cfg = SupervisorConfig::from_env()?;
//!     let entry = EntryFn::arc("server", |ctx: WorkerContext| async move {
//!         // bind, serve...
//!         ctx.cancelled().await;
//!         Ok::<_, WorkerError>(())
//!     });
//!
//!     let outcome = procvisor::launch(cfg, entry).await?;
//!     std::process::exit(outcome.exit_code());
//! }
//! ```

use tracing::{error, info};

use crate::core::{ShutdownReport, Supervisor, SupervisorBuilder, SupervisorConfig};
use crate::error::{RuntimeError, WorkerError};
use crate::worker::{Role, WorkerRef, run_worker, worker_exit_code};

/// How this process finished.
#[derive(Debug)]
pub enum Outcome {
    /// This process was the supervisor.
    Primary(ShutdownReport),
    /// This process was a worker.
    Worker(Result<(), WorkerError>),
}

impl Outcome {
    /// Process exit code.
    ///
    /// The supervisor exits `0` after any completed shutdown, forced or not.
    /// Workers follow [`worker_exit_code`].
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Primary(_) => 0,
            Outcome::Worker(res) => worker_exit_code(res),
        }
    }
}

/// Runs the supervisor or the worker, depending on [`Role::detect`].
///
/// The primary re-executes the current binary with the same arguments for
/// every worker.
pub async fn launch(cfg: SupervisorConfig, entry: WorkerRef) -> Result<Outcome, RuntimeError> {
    launch_with(Role::detect(), Supervisor::builder(cfg), entry).await
}

/// Like [`launch`] with an explicit role and a preconfigured builder.
///
/// `builder` is only built for [`Role::Primary`].
pub async fn launch_with(
    role: Role,
    builder: SupervisorBuilder,
    entry: WorkerRef,
) -> Result<Outcome, RuntimeError> {
    match role {
        Role::Primary => {
            let sup = builder.build()?;
            let cfg = sup.config();
            info!(
                workers = cfg.resolved_workers(),
                mode = cfg.mode.as_str(),
                drain_timeout_ms = cfg.drain_timeout.as_millis() as u64,
                "starting supervisor"
            );
            Ok(Outcome::Primary(sup.run().await?))
        }
        Role::Worker { slot, generation } => {
            info!(
                worker = entry.name(),
                slot,
                generation,
                pid = std::process::id(),
                "worker starting"
            );
            let res = run_worker(entry.as_ref(), slot, generation).await;
            if let Err(e) = &res {
                error!(
                    worker = entry.name(),
                    slot,
                    error = %e,
                    label = e.as_label(),
                    "worker failed"
                );
            }
            Ok(Outcome::Worker(res))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::{EntryFn, WorkerContext};

    #[tokio::test]
    async fn worker_role_runs_entry() {
        let entry = EntryFn::arc("once", |ctx: WorkerContext| async move {
            if ctx.slot() == 4 {
                Ok(())
            } else {
                Err(WorkerError::Fail {
                    error: "wrong slot".into(),
                })
            }
        });
        let builder = Supervisor::builder(SupervisorConfig::default());
        let outcome = launch_with(
            Role::Worker {
                slot: 4,
                generation: 9,
            },
            builder,
            entry,
        )
        .await
        .unwrap();
        assert!(matches!(outcome, Outcome::Worker(Ok(()))));
        assert_eq!(outcome.exit_code(), 0);
    }

    #[tokio::test]
    async fn failing_worker_exits_non_zero() {
        let entry = EntryFn::arc("bad", |_ctx: WorkerContext| async move {
            Err(WorkerError::Fail {
                error: "db unreachable".into(),
            })
        });
        let builder = Supervisor::builder(SupervisorConfig::default());
        let outcome = launch_with(
            Role::Worker {
                slot: 0,
                generation: 1,
            },
            builder,
            entry,
        )
        .await
        .unwrap();
        assert_eq!(outcome.exit_code(), 1);
    }
}

//! # procvisor
//!
//! **Procvisor** keeps a pool of worker processes alive and shuts them down
//! cleanly.
//!
//! A primary process spawns `N` workers (re-running its own binary, or any
//! external command), replaces workers that die while it is running, and on
//! SIGTERM/SIGINT drains the pool: graceful signal first, forceful kill for
//! whatever is still alive after the drain timeout.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  worker #0   │   │  worker #1   │   │  worker #N-1 │   (OS processes)
//!     │  slot 0      │   │  slot 1      │   │  slot N-1    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!      exit  │ ▲ SIGTERM  exit  │ ▲         exit   │ ▲
//!            ▼ │ SIGKILL        ▼ │                ▼ │
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                       │
//! │  - Spawner (CommandSpawner: tokio::process + nix::kill)           │
//! │  - exit watchers ──┐                                              │
//! │  - SignalListener ─┼─► mpsc<Control> ──► control loop (Machine)   │
//! │  - respawn timers ─┘                     owns SupervisorState     │
//! └──────────────────────────────────────┬────────────────────────────┘
//!                                        │ publish(Event)
//!                                        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │              (capacity: SupervisorConfig::bus_capacity)           │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                          (per-sub queues)
//!                        ┌─────────┼─────────┐
//!                        ▼         ▼         ▼
//!                    LogWriter   sub2 ...   subN
//! ```
//!
//! ### Lifecycle
//! ```text
//! Running ──(termination signal)──► Draining ──(all exited | timeout + SIGKILL)──► Stopped
//!
//! Running:
//!   WorkerExited ─► RestartPolicy allows?
//!                     ├─ no  ─► slot stays empty
//!                     └─ yes ─► backoff.next(streak)
//!                                 ├─ 0     ─► spawn replacement now
//!                                 └─ delay ─► RespawnDue after delay (dropped unless Running)
//! Draining:
//!   WorkerExited ─► no replacement; last one → Stopped
//!   drain deadline ─► SIGKILL stragglers once, wait reap_timeout, then Stopped
//!   further termination signals ─► ignored
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                          |
//! |-------------------|-----------------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Fill, repair and drain a pool of worker processes.              | [`Supervisor`], [`SupervisorHandle`]        |
//! | **Processes**     | Pluggable process creation and signalling.                      | [`Spawner`], [`Signaller`], [`CommandSpawner`] |
//! | **Workers**       | Role detection and the code a worker runs.                      | [`Role`], [`WorkerEntry`], [`EntryFn`]      |
//! | **Policies**      | Replacement and respawn delay strategies.                       | [`RestartPolicy`], [`BackoffPolicy`]        |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, custom).          | [`Subscribe`]                               |
//! | **Errors**        | Typed errors for supervision, spawning and workers.             | [`RuntimeError`], [`SpawnError`], [`WorkerError`] |
//! | **Configuration** | Centralize runtime settings, read from the environment.         | [`SupervisorConfig`]                        |
//!
//! ## Optional features
//! - `logging` (default): built-in [`LogWriter`] subscriber rendering events through `tracing`.
//! - `cli` (default): the `procvisor` binary and its crates (`clap`, `tracing-subscriber`,
//!   `dotenvy`, `anyhow`). Library users can turn it off with `default-features = false`.
//!
//! ## Example
//! ```rust,no_run
//! use procvisor::{Supervisor, SupervisorConfig, CommandSpawner, RestartPolicy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = SupervisorConfig {
//!         workers: 2,
//!         restart: RestartPolicy::Always,
//!         ..SupervisorConfig::default()
//!     };
//!
//!     let sup = Supervisor::builder(cfg)
//!         .with_spawner(CommandSpawner::new("node").arg("server.js"))
//!         .build()?;
//!
//!     let report = sup.run().await?;
//!     println!("{} workers spawned, {} force-killed", report.spawned, report.force_killed.len());
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod launch;
mod policies;
mod process;
mod subscribers;
mod worker;

// ---- Public re-exports ----

pub use crate::core::{
    ExecMode, Phase, ShutdownReport, ShutdownSignal, Status, Supervisor, SupervisorBuilder,
    SupervisorConfig, SupervisorHandle, WorkerId, wait_for_shutdown_signal,
};
pub use error::{RuntimeError, SignalError, SpawnError, WorkerError};
pub use events::{Bus, Event, EventKind};
pub use launch::{Outcome, launch, launch_with};
pub use policies::{BackoffPolicy, JitterPolicy, RestartPolicy};
pub use process::{
    ChildSignaller, CommandSpawner, ExitFuture, ExitStatus, SpawnRequest, Spawned, Signaller,
    Spawner, WORKER_GENERATION_ENV, WORKER_ID_ENV,
};
pub use subscribers::{Subscribe, SubscriberSet};
pub use worker::{
    BoxWorkerFuture, EntryFn, Role, WorkerContext, WorkerEntry, WorkerRef, run_entry, run_worker,
    worker_exit_code,
};

// Optional: built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;

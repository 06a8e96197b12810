//! # Supervisor: owns the worker pool, fan-out delivery and graceful shutdown.
//!
//! The [`Supervisor`] owns the event bus, the subscriber list and the spawner.
//! [`Supervisor::run`] fills the pool, keeps it at target size and drains it
//! when a termination signal (or [`SupervisorHandle::shutdown`]) arrives.
//!
//! ## High-level architecture
//! ```text
//! Preparation:
//!   - SignalListener::install()          (fails fast, before any spawn)
//!   - subscriber_listener(): Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!
//! Control loop (single task, owns all state):
//!                    ┌──────────────────────────────────────────────┐
//!   exit watcher ───►│                                              │
//!   signal listener ►│  mpsc<Control> ──► Machine::handle(Control)  │──► publish(Event) ──► Bus
//!   respawn timer ──►│                                              │
//!   SupervisorHandle►│  deadline ──► DrainTimedOut                  │──► watch<Status>
//!                    └──────────────────────────────────────────────┘
//!
//! Shutdown path:
//!   ShutdownRequested
//!     └─► SIGTERM to every live worker (once)
//!     └─► wait drain_timeout:
//!            ├─ all exited          → Bus.publish(AllStoppedWithin)
//!            └─ deadline reached    → Bus.publish(DrainTimedOut), SIGKILL stragglers (once)
//!                   └─► wait reap_timeout, then stop regardless (ReapTimedOut)
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use procvisor::{CommandSpawner, Supervisor, SupervisorConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cfg = SupervisorConfig {
//!         workers: 4,
//!         ..SupervisorConfig::default()
//!     };
//!     let sup = Supervisor::builder(cfg)
//!         .with_spawner(CommandSpawner::new("/usr/bin/my-worker"))
//!         .build()?;
//!
//!     let report = sup.run().await?;
//!     println!("stopped cleanly: {}", report.clean());
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast::error::RecvError, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::core::{
    builder::SupervisorBuilder,
    config::SupervisorConfig,
    control::Control,
    handle::{Status, SupervisorHandle},
    machine::Machine,
    shutdown::SignalListener,
    state::ShutdownReport,
};
use crate::error::RuntimeError;
use crate::events::Bus;
use crate::process::Spawner;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Keeps `N` worker processes alive and shuts them down on request.
pub struct Supervisor {
    cfg: SupervisorConfig,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
    spawner: Arc<dyn Spawner>,
    os_signals: bool,
    tx: mpsc::UnboundedSender<Control>,
    rx: mpsc::UnboundedReceiver<Control>,
    status: watch::Sender<Status>,
}

impl Supervisor {
    /// Starts building a supervisor.
    pub fn builder(cfg: SupervisorConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: SupervisorConfig,
        subscribers: Vec<Arc<dyn Subscribe>>,
        spawner: Arc<dyn Spawner>,
        os_signals: bool,
    ) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let (tx, rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(Status {
            target: cfg.resolved_workers(),
            ..Status::default()
        });
        Self {
            cfg,
            bus,
            subscribers,
            spawner,
            os_signals,
            tx,
            rx,
            status,
        }
    }

    /// Configuration in effect.
    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// Event bus; subscribe before [`run`](Self::run) to see every event.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Remote control usable while [`run`](Self::run) is executing.
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle::new(self.tx.clone(), self.status.subscribe())
    }

    /// Runs until the pool has been drained.
    ///
    /// # Errors
    /// - [`RuntimeError::SignalSetup`] if OS signal handlers cannot be installed
    /// - [`RuntimeError::StartupSpawn`] if any initial worker fails to spawn;
    ///   workers already started are killed first
    pub async fn run(self) -> Result<ShutdownReport, RuntimeError> {
        let Supervisor {
            cfg,
            bus,
            subscribers,
            spawner,
            os_signals,
            tx,
            mut rx,
            status,
        } = self;

        let signals = if os_signals {
            Some(SignalListener::install().map_err(RuntimeError::SignalSetup)?)
        } else {
            None
        };

        let stop = CancellationToken::new();
        let listener = subscriber_listener(&bus, subscribers, stop.clone());
        let signal_task = signals.map(|s| s.spawn(tx.clone()));

        let mut machine = Machine::new(cfg, bus, spawner, tx, status);
        let result = match machine.start() {
            Ok(()) => {
                machine.drive(&mut rx).await;
                Ok(machine.report().clone())
            }
            Err(err) => {
                machine.abort_startup();
                machine.drive(&mut rx).await;
                Err(err)
            }
        };

        if let Some(task) = signal_task {
            task.abort();
        }
        drop(machine);
        stop.cancel();
        if let Err(e) = listener.await {
            warn!(error = %e, "subscriber listener failed");
        }
        result
    }
}

/// Forwards bus events to subscribers until `stop` fires, then flushes what
/// is already buffered and shuts the subscriber workers down.
fn subscriber_listener(
    bus: &Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
    stop: CancellationToken,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    let set = SubscriberSet::new(subscribers, bus.clone());

    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "subscriber listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = stop.cancelled() => {
                    while let Ok(ev) = rx.try_recv() {
                        set.emit(&ev);
                    }
                    break;
                }
            }
        }
        set.shutdown().await;
    })
}

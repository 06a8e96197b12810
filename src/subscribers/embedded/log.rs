//! # LogWriter: events rendered through `tracing`
//!
//! ```text
//! INFO  worker spawned worker=w1 pid=4242 slot=0
//! WARN  worker exited unexpectedly worker=w1 pid=4242 slot=0 code=1 uptime_ms=5012
//! INFO  worker replaced worker=w3 pid=4251 slot=0 previous_pid=4242
//! INFO  shutdown requested; draining workers signal=SIGTERM live=2
//! WARN  drain timeout elapsed; force-killing stragglers stragglers=1 timeout_ms=10000
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber that logs every event at a level matching its severity.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let worker = e.worker.map(|w| w.to_string());
        let worker = worker.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::WorkerSpawned => {
                info!(worker, pid = e.pid, slot = e.slot, "worker spawned");
            }
            EventKind::WorkerExited => {
                if e.code == Some(0) {
                    info!(
                        worker,
                        pid = e.pid,
                        slot = e.slot,
                        code = e.code,
                        uptime_ms = e.uptime_ms,
                        "worker exited"
                    );
                } else {
                    warn!(
                        worker,
                        pid = e.pid,
                        slot = e.slot,
                        code = e.code,
                        signal = e.signal,
                        uptime_ms = e.uptime_ms,
                        "worker exited unexpectedly"
                    );
                }
            }
            EventKind::WorkerStopped => {
                info!(
                    worker,
                    pid = e.pid,
                    slot = e.slot,
                    code = e.code,
                    signal = e.signal,
                    "worker stopped"
                );
            }
            EventKind::WorkerReplaced => {
                info!(
                    worker,
                    pid = e.pid,
                    slot = e.slot,
                    previous_pid = e.previous_pid,
                    "worker replaced"
                );
            }
            EventKind::RespawnScheduled => {
                info!(
                    slot = e.slot,
                    delay_ms = e.delay_ms,
                    streak = e.attempt,
                    "respawn scheduled"
                );
            }
            EventKind::SpawnFailed => {
                error!(slot = e.slot, reason = e.reason.as_deref(), "failed to spawn worker");
            }
            EventKind::ShutdownRequested => {
                info!(
                    signal = e.signal_name,
                    live = e.count,
                    "shutdown requested; draining workers"
                );
            }
            EventKind::ShutdownIgnored => {
                debug!(signal = e.signal_name, "shutdown already in progress; signal ignored");
            }
            EventKind::GracefulSent => {
                debug!(worker, pid = e.pid, "sent graceful termination");
            }
            EventKind::DrainTimedOut => {
                warn!(
                    stragglers = e.count,
                    timeout_ms = e.timeout_ms,
                    "drain timeout elapsed; force-killing stragglers"
                );
            }
            EventKind::ForceKilled => {
                warn!(worker, pid = e.pid, "worker force-killed");
            }
            EventKind::AllStoppedWithin => {
                info!("all workers stopped within drain timeout");
            }
            EventKind::ReapTimedOut => {
                warn!(
                    unreaped = e.count,
                    timeout_ms = e.timeout_ms,
                    "workers did not report exit after kill; stopping anyway"
                );
            }
            EventKind::SubscriberPanicked | EventKind::SubscriberOverflow => {
                warn!(reason = e.reason.as_deref(), "subscriber problem");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}

//! Cloneable remote control for a running [`Supervisor`](crate::Supervisor).

use tokio::sync::{mpsc, watch};

use crate::core::control::{Control, ShutdownSignal};
use crate::core::state::Phase;

/// Point-in-time view of the pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Status {
    /// Current lifecycle phase.
    pub phase: Phase,
    /// Workers whose exit has not been observed yet.
    pub live: usize,
    /// Target pool size.
    pub target: usize,
}

/// Requests shutdown and observes status from outside the control loop.
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::UnboundedSender<Control>,
    status: watch::Receiver<Status>,
}

impl SupervisorHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Control>, status: watch::Receiver<Status>) -> Self {
        Self { tx, status }
    }

    /// Same effect as SIGTERM to the supervisor.
    ///
    /// Returns `false` if the supervisor has already finished.
    pub fn shutdown(&self) -> bool {
        self.tx
            .send(Control::ShutdownRequested {
                signal: ShutdownSignal::Manual,
            })
            .is_ok()
    }

    /// Latest published status.
    pub fn status(&self) -> Status {
        *self.status.borrow()
    }

    /// Waits until `pred` holds for the published status.
    ///
    /// Returns `None` if the supervisor finished without ever satisfying it.
    pub async fn wait_until<F>(&self, mut pred: F) -> Option<Status>
    where
        F: FnMut(&Status) -> bool,
    {
        let mut rx = self.status.clone();
        rx.wait_for(|s| pred(s)).await.ok().map(|s| *s)
    }

    /// Waits for `phase`.
    pub async fn wait_for_phase(&self, phase: Phase) -> Option<Status> {
        self.wait_until(|s| s.phase == phase).await
    }
}

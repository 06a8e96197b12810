//! # Runtime events emitted by the supervisor.
//!
//! [`EventKind`] classifies what happened:
//! - **Pool events**: workers spawned, exited, replaced, respawn scheduled, spawn failed
//! - **Shutdown events**: shutdown requested/ignored, graceful broadcast, drain timeout,
//!   force kill, final outcome
//! - **Subscriber events**: a subscriber panicked or dropped events
//!
//! [`Event`] carries the metadata relevant to its kind (worker id, pid, slot,
//! exit code / signal, delay, reason).
//!
//! ## Ordering guarantees
//! Every event has a globally unique, monotonically increasing `seq`.
//!
//! ## Example
//! ```rust
//! use procvisor::{Event, EventKind, ExitStatus};
//!
//! let ev = Event::new(EventKind::WorkerExited)
//!     .with_pid(4242)
//!     .with_slot(1)
//!     .with_status(ExitStatus::exited(1));
//!
//! assert_eq!(ev.kind, EventKind::WorkerExited);
//! assert_eq!(ev.code, Some(1));
//! assert_eq!(ev.signal, None);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::core::{ShutdownSignal, WorkerId};
use crate::process::ExitStatus;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Pool events ===
    /// A worker process was started.
    ///
    /// Sets: `worker`, `pid`, `slot`.
    WorkerSpawned,

    /// A worker process exited while the supervisor was running.
    ///
    /// Sets: `worker`, `pid`, `slot`, `code` / `signal`, `uptime_ms`.
    WorkerExited,

    /// A worker process exited during shutdown (expected).
    ///
    /// Sets: `worker`, `pid`, `slot`, `code` / `signal`, `uptime_ms`.
    WorkerStopped,

    /// A replacement was spawned for an exited worker.
    ///
    /// Sets: `worker` (new), `pid` (new), `slot`, `previous_pid` (if known).
    WorkerReplaced,

    /// Replacement deferred by backoff or after a failed spawn.
    ///
    /// Sets: `slot`, `delay_ms`, `attempt` (crash streak).
    RespawnScheduled,

    /// The spawner failed to create a worker.
    ///
    /// Sets: `slot`, `reason`.
    SpawnFailed,

    // === Shutdown events ===
    /// Termination requested; the supervisor starts draining.
    ///
    /// Sets: `signal_name`, `count` (live workers).
    ShutdownRequested,

    /// A further termination request arrived while draining/stopped and was ignored.
    ///
    /// Sets: `signal_name`.
    ShutdownIgnored,

    /// Graceful termination signal delivered to a worker.
    ///
    /// Sets: `worker`, `pid`.
    GracefulSent,

    /// Drain window elapsed with workers still alive.
    ///
    /// Sets: `count` (stragglers), `timeout_ms`.
    DrainTimedOut,

    /// Forceful kill delivered to a straggler.
    ///
    /// Sets: `worker`, `pid`.
    ForceKilled,

    /// Every worker exited within the drain window.
    AllStoppedWithin,

    /// Workers did not report exit even after the forceful kill.
    ///
    /// Sets: `count`, `timeout_ms`.
    ReapTimedOut,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `reason` (subscriber name and panic info).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `reason`.
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Supervisor-assigned worker identity.
    pub worker: Option<WorkerId>,
    /// OS process id.
    pub pid: Option<u32>,
    /// Process id of the worker being replaced.
    pub previous_pid: Option<u32>,
    /// Pool slot.
    pub slot: Option<usize>,
    /// Exit code.
    pub code: Option<i32>,
    /// Terminating signal number.
    pub signal: Option<i32>,
    /// Name of the shutdown trigger (`SIGTERM`, `manual`, ...).
    pub signal_name: Option<&'static str>,
    /// Delay before the next spawn (ms).
    pub delay_ms: Option<u32>,
    /// Timeout that elapsed (ms).
    pub timeout_ms: Option<u32>,
    /// How long the worker ran (ms).
    pub uptime_ms: Option<u64>,
    /// Crash streak / attempt number.
    pub attempt: Option<u32>,
    /// Generic counter (live workers, stragglers).
    pub count: Option<usize>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            pid: None,
            previous_pid: None,
            slot: None,
            code: None,
            signal: None,
            signal_name: None,
            delay_ms: None,
            timeout_ms: None,
            uptime_ms: None,
            attempt: None,
            count: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_worker(mut self, id: WorkerId) -> Self {
        self.worker = Some(id);
        self
    }

    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    #[inline]
    pub fn with_previous_pid(mut self, pid: Option<u32>) -> Self {
        self.previous_pid = pid;
        self
    }

    #[inline]
    pub fn with_slot(mut self, slot: usize) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Attaches exit code and signal.
    #[inline]
    pub fn with_status(mut self, status: ExitStatus) -> Self {
        self.code = status.code;
        self.signal = status.signal;
        self
    }

    #[inline]
    pub fn with_signal_name(mut self, signal: ShutdownSignal) -> Self {
        self.signal_name = Some(signal.as_str());
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(clamp_ms(d));
        self
    }

    /// Attaches a timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(clamp_ms(d));
        self
    }

    #[inline]
    pub fn with_uptime(mut self, d: Duration) -> Self {
        self.uptime_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(n);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} panic={info}"))
    }

    /// True for events the subscriber layer produces about itself.
    ///
    /// Reporting a failure while handling one of these would feed the bus
    /// its own output, so such failures are only logged.
    #[inline]
    pub fn is_subscriber_report(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

fn clamp_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::new(EventKind::WorkerSpawned);
        let b = Event::new(EventKind::WorkerSpawned);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn long_durations_saturate() {
        let ev = Event::new(EventKind::DrainTimedOut).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }
}

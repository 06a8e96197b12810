//! # Supervisor state: worker table and lifecycle phase.
//!
//! ```text
//! SupervisorState
//!   phase:    Running ──► Draining ──► Stopped
//!   workers:  WorkerId ──► WorkerRecord { pid, slot, signaller, started, flags }
//!   streaks:  slot ──► consecutive quick crashes
//!   next_id:  monotonic, never reused
//! ```
//!
//! ## Rules
//! - Only the control loop touches this state.
//! - A record is removed the moment its exit is observed; a replacement is a
//!   new record with a new [`WorkerId`].
//! - `terminate_sent` / `kill_sent` make each signal at-most-once per worker.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::process::Signaller;

/// Supervisor-assigned worker identity. Monotonic and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    /// Wraps a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id.
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Lifecycle phase of the supervisor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// Keeping the pool at target size.
    #[default]
    Running,
    /// Shutdown in progress; nothing is spawned.
    Draining,
    /// Terminal.
    Stopped,
}

impl Phase {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Running => "running",
            Phase::Draining => "draining",
            Phase::Stopped => "stopped",
        }
    }
}

/// One live worker process.
pub(crate) struct WorkerRecord {
    pub id: WorkerId,
    pub pid: u32,
    pub slot: usize,
    pub signaller: Box<dyn Signaller>,
    pub started: Instant,
    pub terminate_sent: bool,
    pub kill_sent: bool,
}

/// Pool state owned by one supervisor.
pub(crate) struct SupervisorState {
    pub phase: Phase,
    pub target: usize,
    /// Set once the drain timeout has fired and stragglers were killed.
    pub escalated: bool,
    workers: BTreeMap<WorkerId, WorkerRecord>,
    streaks: HashMap<usize, u32>,
    next_id: u64,
}

impl SupervisorState {
    pub fn new(target: usize) -> Self {
        Self {
            phase: Phase::Running,
            target,
            escalated: false,
            workers: BTreeMap::new(),
            streaks: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn allocate_id(&mut self) -> WorkerId {
        let id = WorkerId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, rec: WorkerRecord) {
        self.workers.insert(rec.id, rec);
    }

    pub fn remove(&mut self, id: WorkerId) -> Option<WorkerRecord> {
        self.workers.remove(&id)
    }

    pub fn live(&self) -> usize {
        self.workers.len()
    }

    pub fn slot_occupied(&self, slot: usize) -> bool {
        self.workers.values().any(|w| w.slot == slot)
    }

    pub fn pids(&self) -> Vec<u32> {
        self.workers.values().map(|w| w.pid).collect()
    }

    #[cfg(test)]
    pub fn ids(&self) -> Vec<WorkerId> {
        self.workers.keys().copied().collect()
    }

    pub fn workers_mut(&mut self) -> impl Iterator<Item = &mut WorkerRecord> {
        self.workers.values_mut()
    }

    /// Updates the crash streak of `slot` after a worker ran for `uptime` and
    /// returns the new streak (0-indexed: first quick crash is 0).
    pub fn record_crash(&mut self, slot: usize, uptime: Duration, stable_after: Duration) -> u32 {
        if uptime >= stable_after {
            self.streaks.remove(&slot);
            return 0;
        }
        let streak = self.streaks.entry(slot).or_insert(0);
        let current = *streak;
        *streak = streak.saturating_add(1);
        current
    }
}

/// Summary returned by [`Supervisor::run`](crate::Supervisor::run).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Total worker processes started (including replacements).
    pub spawned: usize,
    /// Replacements started after an exit while running.
    pub replaced: usize,
    /// Graceful termination signals delivered.
    pub graceful_sent: usize,
    /// Pids that received the forceful kill.
    pub force_killed: Vec<u32>,
    /// Termination requests ignored because shutdown was already underway.
    pub ignored_signals: usize,
    /// Pids whose exit was never observed before the reap timeout.
    pub unreaped: Vec<u32>,
}

impl ShutdownReport {
    /// True if every worker stopped within the drain window.
    pub fn clean(&self) -> bool {
        self.force_killed.is_empty() && self.unreaped.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SignalError;

    struct Noop;
    impl Signaller for Noop {
        fn terminate(&self) -> Result<(), SignalError> {
            Ok(())
        }
        fn kill(&self) -> Result<(), SignalError> {
            Ok(())
        }
    }

    fn record(state: &mut SupervisorState, slot: usize) -> WorkerId {
        let id = state.allocate_id();
        state.insert(WorkerRecord {
            id,
            pid: 100 + id.get() as u32,
            slot,
            signaller: Box::new(Noop),
            started: Instant::now(),
            terminate_sent: false,
            kill_sent: false,
        });
        id
    }

    #[test]
    fn ids_are_never_reused() {
        let mut state = SupervisorState::new(1);
        let a = record(&mut state, 0);
        state.remove(a);
        let b = record(&mut state, 0);
        assert!(b > a);
        assert_eq!(state.live(), 1);
        assert!(state.slot_occupied(0));
        assert!(!state.slot_occupied(1));
    }

    #[test]
    fn second_removal_is_noop() {
        let mut state = SupervisorState::new(1);
        let id = record(&mut state, 0);
        assert!(state.remove(id).is_some());
        assert!(state.remove(id).is_none());
    }

    #[test]
    fn crash_streak_resets_for_stable_workers() {
        let mut state = SupervisorState::new(2);
        let quick = Duration::from_millis(10);
        let stable = Duration::from_secs(10);

        assert_eq!(state.record_crash(0, quick, stable), 0);
        assert_eq!(state.record_crash(0, quick, stable), 1);
        assert_eq!(state.record_crash(0, quick, stable), 2);
        assert_eq!(state.record_crash(1, quick, stable), 0);
        assert_eq!(state.record_crash(0, Duration::from_secs(60), stable), 0);
        assert_eq!(state.record_crash(0, quick, stable), 0);
    }
}

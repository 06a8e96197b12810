//! Which side of the fork this process is on.

use crate::process::{WORKER_GENERATION_ENV, WORKER_ID_ENV};

/// Process role, decided once at startup from [`WORKER_ID_ENV`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// The supervising process.
    Primary,
    /// A worker started by the supervisor.
    Worker {
        /// Pool slot the worker fills.
        slot: usize,
        /// Unique id of this worker process (`0` if not provided).
        generation: u64,
    },
}

impl Role {
    /// Reads the role from the process environment.
    pub fn detect() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`detect`](Self::detect) but reading through `lookup`.
    ///
    /// A marker that is not a number is treated as absent.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(slot) = lookup(WORKER_ID_ENV).and_then(|v| v.trim().parse().ok()) else {
            return Role::Primary;
        };
        let generation = lookup(WORKER_GENERATION_ENV)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        Role::Worker { slot, generation }
    }

    /// True for [`Role::Primary`].
    pub fn is_primary(&self) -> bool {
        matches!(self, Role::Primary)
    }
}

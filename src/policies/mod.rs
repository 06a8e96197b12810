//! Replacement policies.
//!
//! - [`RestartPolicy`] whether an exited worker is replaced (always / on-failure / never)
//! - [`BackoffPolicy`] how long to wait before the replacement (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization so simultaneous crashes do not respawn in lockstep
//!
//! ```text
//! WorkerExited (phase = running)
//!      └─► restart.replaces(status)?   no ─► slot stays empty
//!               └─ yes ─► delay = backoff.next(crash_streak)
//!                          ├─ 0   ─► spawn now
//!                          └─ >0  ─► RespawnDue after delay (dropped if no longer running)
//! ```

mod backoff;
mod jitter;
mod restart;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use restart::RestartPolicy;

//! # Worker entry point abstraction.
//!
//! A [`WorkerEntry`] is the code a worker process runs. It receives a
//! [`WorkerContext`] whose token is cancelled when the process gets its
//! termination signal, and should return promptly after that.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;

/// Boxed future returned by [`WorkerEntry::spawn`].
pub type BoxWorkerFuture = Pin<Box<dyn Future<Output = Result<(), WorkerError>> + Send + 'static>>;

/// Shared handle to a worker entry.
pub type WorkerRef = Arc<dyn WorkerEntry>;

/// What a worker knows about itself.
#[derive(Clone, Debug)]
pub struct WorkerContext {
    slot: usize,
    generation: u64,
    token: CancellationToken,
}

impl WorkerContext {
    /// Creates a context.
    pub fn new(slot: usize, generation: u64, token: CancellationToken) -> Self {
        Self {
            slot,
            generation,
            token,
        }
    }

    /// Pool slot, stable across replacements.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Unique id of this worker process.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cancelled once shutdown has been requested.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown has been requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// # Code run inside each worker process.
///
/// # Example
/// ```
/// use procvisor::{BoxWorkerFuture, WorkerContext, WorkerEntry};
///
/// struct Idle;
///
/// impl WorkerEntry for Idle {
///     fn name(&self) -> &str { "idle" }
///
///     fn spawn(&self, ctx: WorkerContext) -> BoxWorkerFuture {
///         Box::pin(async move {
///             ctx.cancelled().await;
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait WorkerEntry: Send + Sync + 'static {
    /// Stable, human-readable name used in logs.
    fn name(&self) -> &str;

    /// Creates the worker future.
    fn spawn(&self, ctx: WorkerContext) -> BoxWorkerFuture;
}

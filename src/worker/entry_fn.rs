//! # Function-backed worker entry (`EntryFn`)
//!
//! [`EntryFn`] wraps a closure `F: Fn(WorkerContext) -> Fut`.
//!
//! ## Example
//! ```rust
//! use procvisor::{EntryFn, WorkerContext, WorkerError, WorkerRef};
//!
//! let entry: WorkerRef = EntryFn::arc("server", |ctx: WorkerContext| async move {
//!     ctx.cancelled().await;
//!     Ok::<_, WorkerError>(())
//! });
//!
//! assert_eq!(entry.name(), "server");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use crate::error::WorkerError;
use crate::worker::entry::{BoxWorkerFuture, WorkerContext, WorkerEntry};

/// Function-backed worker entry.
#[derive(Debug)]
pub struct EntryFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> EntryFn<F> {
    /// Creates a new function-backed entry.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the entry and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F, Fut> WorkerEntry for EntryFn<F>
where
    F: Fn(WorkerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkerError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn spawn(&self, ctx: WorkerContext) -> BoxWorkerFuture {
        Box::pin((self.f)(ctx))
    }
}

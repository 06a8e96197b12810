//! # Worker-side runner.
//!
//! ```text
//! run_worker(entry, slot, generation)
//!   ├─► SignalListener::install()        (before the entry starts)
//!   ├─► entry.spawn(ctx)                  (panics caught → Fatal)
//!   └─► select:
//!         ├─ entry returns          → its result
//!         └─ SIGTERM/SIGINT/SIGQUIT → ctx.token.cancel(), await entry
//! ```
//!
//! A second signal while the entry is winding down is ignored; the
//! supervisor's drain timeout and SIGKILL are the backstop.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::SignalListener;
use crate::error::WorkerError;
use crate::subscribers::panic_message;
use crate::worker::entry::{WorkerContext, WorkerEntry};

/// Runs `entry` in this worker process until it returns or a termination
/// signal cancels it.
pub async fn run_worker(
    entry: &dyn WorkerEntry,
    slot: usize,
    generation: u64,
) -> Result<(), WorkerError> {
    let mut signals = SignalListener::install().map_err(|e| WorkerError::Fatal {
        error: format!("cannot install signal handlers: {e}"),
    })?;
    let token = CancellationToken::new();
    let ctx = WorkerContext::new(slot, generation, token.clone());

    let run = run_entry(entry, ctx);
    tokio::pin!(run);

    tokio::select! {
        res = &mut run => res,
        signal = signals.recv() => {
            info!(worker = entry.name(), slot, signal = signal.as_str(), "worker stopping");
            token.cancel();
            run.await
        }
    }
}

/// Runs one entry future to completion, turning panics into [`WorkerError::Fatal`].
pub async fn run_entry(entry: &dyn WorkerEntry, ctx: WorkerContext) -> Result<(), WorkerError> {
    let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| entry.spawn(ctx))) {
        Ok(fut) => fut,
        Err(panic) => return Err(panicked(entry, panic.as_ref())),
    };
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res,
        Err(panic) => Err(panicked(entry, panic.as_ref())),
    }
}

fn panicked(entry: &dyn WorkerEntry, panic: &(dyn std::any::Any + Send)) -> WorkerError {
    let info = panic_message(panic);
    warn!(worker = entry.name(), panic = %info, "worker entry panicked");
    WorkerError::Fatal {
        error: format!("panicked: {info}"),
    }
}

/// Process exit code for a finished worker.
///
/// `0` for success or cancellation, `1` for [`WorkerError::Fail`] and `2` for
/// [`WorkerError::Fatal`].
pub fn worker_exit_code(res: &Result<(), WorkerError>) -> i32 {
    match res {
        Ok(()) | Err(WorkerError::Canceled) => 0,
        Err(WorkerError::Fail { .. }) => 1,
        Err(WorkerError::Fatal { .. }) => 2,
    }
}

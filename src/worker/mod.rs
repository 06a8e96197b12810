//! Worker side: role detection and the entry point each worker process runs.
//!
//! - [`Role`]: primary or worker, from the marker the spawner sets;
//! - [`WorkerEntry`] / [`EntryFn`]: code run inside a worker;
//! - [`run_worker`]: runs an entry and cancels it on the termination signal.

mod entry;
mod entry_fn;
mod role;
mod runner;

pub use entry::{BoxWorkerFuture, WorkerContext, WorkerEntry, WorkerRef};
pub use entry_fn::EntryFn;
pub use role::Role;
pub use runner::{run_entry, run_worker, worker_exit_code};

//! OS process primitives consumed by the supervisor.
//!
//! - [`Spawner`] / [`Spawned`] / [`Signaller`] the injectable seam
//! - [`CommandSpawner`] child processes via `tokio::process`
//! - [`ChildSignaller`] SIGTERM / SIGKILL through the shared child handle

mod child;
mod command;
mod spawner;

pub use command::{CommandSpawner, WORKER_GENERATION_ENV, WORKER_ID_ENV};
pub use child::ChildSignaller;
pub use spawner::{ExitFuture, ExitStatus, SpawnRequest, Spawned, Signaller, Spawner};

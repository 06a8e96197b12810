//! Runtime core: pool state machine and lifecycle.
//!
//! The public API from this module is [`Supervisor`] with its builder and
//! handle, plus the configuration and state types they expose.
//!
//! Internal modules:
//! - [`machine`]: the control loop applying every state transition;
//! - [`supervisor`]: wires spawner, bus, subscribers and signals around the loop;
//! - [`shutdown`]: cross-platform shutdown signal handling;
//! - [`state`]: worker table, phase, crash streaks.

mod builder;
mod config;
mod control;
mod handle;
mod machine;
mod shutdown;
mod state;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::{ExecMode, SupervisorConfig};
pub use control::ShutdownSignal;
pub use handle::{Status, SupervisorHandle};
pub(crate) use shutdown::SignalListener;
pub use shutdown::wait_for_shutdown_signal;
pub use state::{Phase, ShutdownReport, WorkerId};
pub use supervisor::Supervisor;

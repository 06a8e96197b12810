//! # Restart policies for worker processes.
//!
//! [`RestartPolicy`] decides whether an exited worker is replaced. It is only
//! consulted while the supervisor is running; exits observed while draining
//! are never replaced, whatever the policy says.
//!
//! ```text
//! Always     → every exit is replaced (default, keeps pool at target size)
//! OnFailure  → replace non-zero / signal exits; a clean `exit 0` shrinks the pool
//! Never      → nothing is replaced; the pool only shrinks
//! ```

use std::str::FromStr;

use crate::error::RuntimeError;
use crate::process::ExitStatus;

/// Policy controlling whether an exited worker is replaced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Replace every worker that exits.
    #[default]
    Always,
    /// Replace only workers that exited unsuccessfully.
    OnFailure,
    /// Never replace.
    Never,
}

impl RestartPolicy {
    /// Whether a worker that ended with `status` should be replaced.
    pub fn replaces(&self, status: &ExitStatus) -> bool {
        match self {
            RestartPolicy::Always => true,
            RestartPolicy::OnFailure => !status.success(),
            RestartPolicy::Never => false,
        }
    }

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RestartPolicy::Always => "always",
            RestartPolicy::OnFailure => "on-failure",
            RestartPolicy::Never => "never",
        }
    }
}

impl FromStr for RestartPolicy {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(RestartPolicy::Always),
            "on-failure" | "on_failure" | "onfailure" => Ok(RestartPolicy::OnFailure),
            "never" => Ok(RestartPolicy::Never),
            other => Err(RuntimeError::invalid(format!(
                "unknown restart policy {other:?} (expected always, on-failure or never)"
            ))),
        }
    }
}

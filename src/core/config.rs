//! # Supervisor configuration.
//!
//! [`SupervisorConfig`] centralizes pool size, shutdown timing and replacement policy.
//! It is built in code ([`Default`] + field updates) or read from the
//! environment once at startup with [`SupervisorConfig::from_env`].
//!
//! ## Environment
//! | Variable                      | Meaning                                          |
//! |-------------------------------|--------------------------------------------------|
//! | `PROCVISOR_ENV` / `NODE_ENV`  | `development` (default) or `production`          |
//! | `PROCVISOR_WORKERS`           | explicit worker count (`0` = derive from mode)   |
//! | `PROCVISOR_DRAIN_TIMEOUT_MS`  | drain window in milliseconds                     |
//! | `PROCVISOR_RESTART`           | `always`, `on-failure` or `never`                |
//!
//! ## Sentinel values
//! - `workers = 0` → derive from [`ExecMode`]: 1 in development, one per CPU in production.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use crate::error::RuntimeError;
use crate::policies::{BackoffPolicy, RestartPolicy};

/// Execution mode, selecting the default worker count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecMode {
    /// Single worker; fast restarts while iterating locally.
    #[default]
    Development,
    /// One worker per available CPU.
    Production,
}

impl ExecMode {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecMode::Development => "development",
            ExecMode::Production => "production",
        }
    }
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecMode {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "development" | "dev" | "test" => Ok(ExecMode::Development),
            "production" | "prod" => Ok(ExecMode::Production),
            other => Err(RuntimeError::invalid(format!(
                "unknown execution mode {other:?} (expected development or production)"
            ))),
        }
    }
}

/// Configuration for the worker supervisor.
///
/// ## Field semantics
/// - `workers`: target pool size (`0` = derive from `mode`)
/// - `drain_timeout`: how long workers get to exit after the graceful signal
/// - `reap_timeout`: how long to wait for exit reports after the forceful kill
/// - `stable_after`: uptime after which a worker's exit no longer counts as a crash streak
/// - `spawn_retry`: minimum delay before retrying a failed replacement spawn
/// - `bus_capacity`: event bus ring buffer size (min 1)
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Target number of workers (`0` = derive from `mode`).
    pub workers: usize,

    /// Execution mode.
    pub mode: ExecMode,

    /// Drain window after the graceful termination signal.
    pub drain_timeout: Duration,

    /// Wait for exit reports after the forceful kill before stopping anyway.
    pub reap_timeout: Duration,

    /// Whether an exited worker is replaced while running.
    pub restart: RestartPolicy,

    /// Delay before a replacement spawn.
    pub backoff: BackoffPolicy,

    /// Uptime after which a worker's slot crash streak resets.
    pub stable_after: Duration,

    /// Minimum delay before retrying a replacement whose spawn failed.
    pub spawn_retry: Duration,

    /// Capacity of the event bus.
    pub bus_capacity: usize,
}

impl Default for SupervisorConfig {
    /// - `workers = 0` (derive from mode), `mode = Development`
    /// - `drain_timeout = 10s`, `reap_timeout = 5s`
    /// - `restart = Always`, `backoff` immediate
    /// - `stable_after = 10s`, `spawn_retry = 1s`, `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            workers: 0,
            mode: ExecMode::default(),
            drain_timeout: Duration::from_secs(10),
            reap_timeout: Duration::from_secs(5),
            restart: RestartPolicy::default(),
            backoff: BackoffPolicy::default(),
            stable_after: Duration::from_secs(10),
            spawn_retry: Duration::from_secs(1),
            bus_capacity: 1024,
        }
    }
}

impl SupervisorConfig {
    /// Reads the process environment. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, RuntimeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reading through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RuntimeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(mode) = lookup("PROCVISOR_ENV").or_else(|| lookup("NODE_ENV")) {
            cfg.mode = mode.parse()?;
        }
        if let Some(raw) = lookup("PROCVISOR_WORKERS") {
            cfg.workers = parse_number("PROCVISOR_WORKERS", &raw)?;
        }
        if let Some(raw) = lookup("PROCVISOR_DRAIN_TIMEOUT_MS") {
            cfg.drain_timeout =
                Duration::from_millis(parse_number("PROCVISOR_DRAIN_TIMEOUT_MS", &raw)?);
        }
        if let Some(raw) = lookup("PROCVISOR_RESTART") {
            cfg.restart = raw.parse()?;
        }
        Ok(cfg)
    }

    /// Effective pool size, always `>= 1`.
    ///
    /// An explicit `workers` wins; otherwise development runs one worker and
    /// production one per available CPU.
    pub fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        match self.mode {
            ExecMode::Development => 1,
            ExecMode::Production => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T, RuntimeError> {
    raw.trim()
        .parse()
        .map_err(|_| RuntimeError::invalid(format!("{key}={raw:?} is not a valid number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg_from(pairs: &[(&str, &str)]) -> Result<SupervisorConfig, RuntimeError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SupervisorConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn development_runs_one_worker() {
        let cfg = cfg_from(&[]).unwrap();
        assert_eq!(cfg.mode, ExecMode::Development);
        assert_eq!(cfg.resolved_workers(), 1);
    }

    #[test]
    fn production_runs_one_per_cpu() {
        let cfg = cfg_from(&[("NODE_ENV", "production")]).unwrap();
        let cpus = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        assert_eq!(cfg.mode, ExecMode::Production);
        assert_eq!(cfg.resolved_workers(), cpus);
    }

    #[test]
    fn explicit_count_overrides_mode() {
        let cfg = cfg_from(&[("PROCVISOR_ENV", "production"), ("PROCVISOR_WORKERS", "3")])
            .unwrap();
        assert_eq!(cfg.resolved_workers(), 3);

        let cfg = cfg_from(&[("PROCVISOR_WORKERS", "0")]).unwrap();
        assert_eq!(cfg.resolved_workers(), 1);
    }

    #[test]
    fn procvisor_env_wins_over_node_env() {
        let cfg = cfg_from(&[("PROCVISOR_ENV", "development"), ("NODE_ENV", "production")])
            .unwrap();
        assert_eq!(cfg.mode, ExecMode::Development);
    }

    #[test]
    fn parses_timing_and_policy() {
        let cfg = cfg_from(&[
            ("PROCVISOR_DRAIN_TIMEOUT_MS", "2500"),
            ("PROCVISOR_RESTART", "on-failure"),
        ])
        .unwrap();
        assert_eq!(cfg.drain_timeout, Duration::from_millis(2500));
        assert_eq!(cfg.restart, RestartPolicy::OnFailure);
    }

    #[test]
    fn rejects_garbage() {
        let err = cfg_from(&[("PROCVISOR_WORKERS", "many")]).unwrap_err();
        assert_eq!(err.as_label(), "runtime_invalid_config");
        assert!(cfg_from(&[("PROCVISOR_ENV", "staging")]).is_err());
        assert!(cfg_from(&[("PROCVISOR_DRAIN_TIMEOUT_MS", "-1")]).is_err());
    }
}

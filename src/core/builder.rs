use std::sync::Arc;

use crate::{
    core::{SupervisorConfig, supervisor::Supervisor},
    error::RuntimeError,
    process::{CommandSpawner, Spawner},
    subscribers::Subscribe,
};

/// Builder for constructing a [`Supervisor`] with optional features.
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    spawner: Option<Arc<dyn Spawner>>,
    os_signals: bool,

    #[cfg(feature = "logging")]
    event_log: bool,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            spawner: None,
            os_signals: true,

            #[cfg(feature = "logging")]
            event_log: true,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive supervisor events (spawns, exits, shutdown steps)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Replaces the default spawner (re-executing the current binary).
    pub fn with_spawner<S: Spawner>(mut self, spawner: S) -> Self {
        self.spawner = Some(Arc::new(spawner));
        self
    }

    /// Whether to listen for SIGINT/SIGTERM/SIGQUIT (default `true`).
    ///
    /// With `false`, shutdown is only reachable through
    /// [`SupervisorHandle::shutdown`](crate::SupervisorHandle::shutdown).
    pub fn with_os_signals(mut self, enabled: bool) -> Self {
        self.os_signals = enabled;
        self
    }

    /// Whether to attach [`LogWriter`](crate::LogWriter) (default `true`).
    ///
    /// Requires the `logging` feature flag.
    #[cfg(feature = "logging")]
    pub fn with_event_log(mut self, enabled: bool) -> Self {
        self.event_log = enabled;
        self
    }

    /// Builds the supervisor.
    ///
    /// Without an explicit spawner, workers are the current executable
    /// re-run with the same arguments.
    pub fn build(self) -> Result<Supervisor, RuntimeError> {
        let spawner = match self.spawner {
            Some(spawner) => spawner,
            None => Arc::new(
                CommandSpawner::current_exe()
                    .map_err(RuntimeError::SpawnerSetup)?
                    .args(std::env::args_os().skip(1)),
            ),
        };

        #[allow(unused_mut)]
        let mut subscribers = self.subscribers;
        #[cfg(feature = "logging")]
        if self.event_log {
            subscribers.push(Arc::new(crate::subscribers::LogWriter::new()));
        }

        Ok(Supervisor::new_internal(
            self.cfg,
            subscribers,
            spawner,
            self.os_signals,
        ))
    }
}

//! Tracing setup for the binary.

use std::io;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_FILTER: &str = "procvisor=info";

/// Log output format.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// Multi-line human-readable output.
    Pretty,
    /// One line per event.
    #[default]
    Compact,
    /// JSON for log aggregation.
    Json,
}

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
///
/// Logs go to stderr so worker stdout stays untouched.
pub fn init(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let res = match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(false).with_writer(io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init(),
    };
    if let Err(e) = res {
        eprintln!("procvisor: logging already initialised: {e}");
    }
}

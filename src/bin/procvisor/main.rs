//! procvisor command-line supervisor.
//!
//! ```text
//! procvisor [OPTIONS]                 # N copies of the built-in health worker
//! procvisor [OPTIONS] -- node app.js  # N copies of an external command
//! ```
//!
//! Settings come from `.env`, then `PROCVISOR_*` variables, then flags.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use procvisor::{CommandSpawner, ExecMode, Outcome, RestartPolicy, Supervisor, SupervisorConfig};
use tracing::{error, info};

mod demo;
mod logging;

use logging::LogFormat;

/// Keep a pool of worker processes alive; drain it on SIGTERM.
#[derive(Parser, Debug)]
#[command(name = "procvisor")]
#[command(version)]
struct Cli {
    /// Number of workers (default: 1 in development, one per CPU in production).
    #[arg(short, long, value_name = "N")]
    workers: Option<usize>,

    /// Execution mode: development or production.
    #[arg(short, long, value_name = "MODE")]
    mode: Option<ExecMode>,

    /// Time workers get to exit after SIGTERM before SIGKILL.
    #[arg(long, value_name = "MS")]
    drain_timeout_ms: Option<u64>,

    /// Replace exited workers: always, on-failure or never.
    #[arg(long, value_name = "POLICY")]
    restart: Option<RestartPolicy>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    /// Command to run as each worker (after `--`).
    #[arg(last = true, value_name = "COMMAND")]
    command: Vec<String>,
}

impl Cli {
    fn config(&self) -> anyhow::Result<SupervisorConfig> {
        let mut cfg = SupervisorConfig::from_env().context("invalid PROCVISOR_* environment")?;
        if let Some(workers) = self.workers {
            cfg.workers = workers;
        }
        if let Some(mode) = self.mode {
            cfg.mode = mode;
        }
        if let Some(ms) = self.drain_timeout_ms {
            cfg.drain_timeout = Duration::from_millis(ms);
        }
        if let Some(restart) = self.restart {
            cfg.restart = restart;
        }
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init(cli.log_format);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            let msg = format!("{e:#}");
            error!(error = %msg, "procvisor failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let cfg = cli.config()?;

    let outcome = match cli.command.split_first() {
        None => procvisor::launch(cfg, demo::entry()).await?,
        Some((program, args)) => {
            info!(
                program = %program,
                workers = cfg.resolved_workers(),
                mode = cfg.mode.as_str(),
                "supervising external command"
            );
            let sup = Supervisor::builder(cfg)
                .with_spawner(CommandSpawner::new(program).args(args))
                .build()?;
            Outcome::Primary(sup.run().await?)
        }
    };

    if let Outcome::Primary(report) = &outcome {
        info!(
            spawned = report.spawned,
            replaced = report.replaced,
            force_killed = report.force_killed.len(),
            unreaped = report.unreaped.len(),
            "supervisor stopped"
        );
    }
    Ok(ExitCode::from(u8::try_from(outcome.exit_code()).unwrap_or(1)))
}

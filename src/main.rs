mod config;
mod lifecycle;
mod signals;
mod status;
mod stop;
mod worker;

use clap::Parser;
use config::{DaemonConfig, Overrides};
use signals::{OsSignals, ProcessExit};
use status::StateReporter;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// A minimal background daemon: run a periodic task, stop cleanly on
/// SIGINT/SIGTERM, and never take longer than the shutdown deadline to exit.
#[derive(Parser, Debug)]
#[command(name = "tickd", version, about)]
pub struct Cli {
    /// Config file path (default: tickd.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tick interval in milliseconds (overrides config)
    #[arg(long, value_name = "MS")]
    tick_interval_ms: Option<u64>,

    /// Shutdown deadline in milliseconds (overrides config)
    #[arg(long, value_name = "MS")]
    deadline_ms: Option<u64>,

    /// Status file path (overrides config)
    #[arg(long, value_name = "FILE")]
    status_file: Option<PathBuf>,

    /// Validate config and print resolved settings, don't run
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (state transitions, config resolution)
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            tick_interval_ms: self.tick_interval_ms,
            deadline_ms: self.deadline_ms,
            status_file: self.status_file.clone(),
        }
    }

    fn default_log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

fn resolve_config(cli: &Cli) -> Result<DaemonConfig, config::ConfigError> {
    let mut config = DaemonConfig::load(cli.config.as_deref())?;
    config.apply(cli.overrides());
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.default_log_level());
    tracing::debug!(?cli, "parsed CLI arguments");

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    if cli.dry_run {
        println!("tickd v{}", env!("CARGO_PKG_VERSION"));
        println!("tick interval:     {} ms", config.worker.tick_interval_ms);
        println!("on failure:        {:?}", config.worker.on_failure);
        println!("shutdown deadline: {} ms", config.shutdown.deadline_ms);
        println!("forced exit code:  {}", config.shutdown.forced_exit_code);
        match &config.status.file {
            Some(path) => println!("status file:       {}", path.display()),
            None => println!("status file:       (disabled)"),
        }
        return ExitCode::SUCCESS;
    }

    let signals = match OsSignals::install() {
        Ok(signals) => signals,
        Err(e) => {
            tracing::error!(error = %e, "failed to install signal handlers");
            return ExitCode::FAILURE;
        }
    };

    let reporter = StateReporter::new(
        config.status.file.clone(),
        config.worker.tick_interval_ms,
        config.shutdown.deadline_ms,
    );

    match lifecycle::run(
        worker::Heartbeat::default(),
        signals,
        ProcessExit,
        config,
        reporter,
    )
    .await
    {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "daemon failed");
            ExitCode::FAILURE
        }
    }
}

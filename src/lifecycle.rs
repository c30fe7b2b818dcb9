//! Lifecycle coordinator: starts the worker and the signal listener, then
//! waits for the worker's completion token.
//!
//! The forced-exit path in the signal listener races the normal return from
//! [`run`]. Whichever finishes first decides how the process ends.

use crate::config::DaemonConfig;
use crate::signals::{SignalListener, TerminationSource, Terminator};
use crate::status::{DaemonState, StateReporter};
use crate::stop::StopSignal;
use crate::worker::{self, PeriodicTask, WorkerSummary};
use tokio::sync::oneshot;
use tracing::info;

/// Errors that end the coordinator without a worker summary.
#[derive(Debug)]
pub enum LifecycleError {
    /// The worker task went away without resolving its completion token.
    WorkerLost,
}

impl std::fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleError::WorkerLost => {
                write!(f, "worker exited without reporting completion")
            }
        }
    }
}

impl std::error::Error for LifecycleError {}

/// Run the daemon until the worker loop returns.
///
/// Does not return at all when the shutdown deadline forces the process out
/// first.
pub async fn run<T, S, X>(
    task: T,
    source: S,
    terminator: X,
    config: DaemonConfig,
    reporter: StateReporter,
) -> Result<WorkerSummary, LifecycleError>
where
    T: PeriodicTask,
    S: TerminationSource,
    X: Terminator,
{
    info!(
        tick_interval_ms = config.worker.tick_interval_ms,
        deadline_ms = config.shutdown.deadline_ms,
        "starting daemon"
    );
    reporter.transition(DaemonState::Running);

    let stop = StopSignal::new();
    let (done_tx, done_rx) = oneshot::channel();

    let worker = worker::run(
        task,
        config.worker.tick_interval(),
        config.worker.on_failure,
        stop.listener(),
    );
    tokio::spawn(async move {
        let summary = worker.await;
        let _ = done_tx.send(summary);
    });

    let listener = tokio::spawn(
        SignalListener::new(
            source,
            stop,
            config.shutdown.deadline(),
            config.shutdown.forced_exit_code,
            terminator,
            reporter.clone(),
        )
        .run(),
    );

    let outcome = done_rx.await;

    // Cancels any pending deadline and drops the stop signal.
    listener.abort();

    let summary = outcome.map_err(|_| LifecycleError::WorkerLost)?;
    reporter.transition(DaemonState::Stopped);
    info!(
        cycles = summary.cycles,
        failures = summary.failures,
        exit = ?summary.exit,
        "daemon stopped"
    );
    Ok(summary)
}

/// Worker loop: run a periodic task on a fixed cadence until the stop signal fires.
use crate::config::FailurePolicy;
use crate::stop::StopListener;
use std::future::Future;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

/// Error type returned by a periodic task.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// The action performed on every tick.
///
/// Implementations are where real work plugs into the daemon. A task that
/// never returns keeps the worker from seeing the stop signal; the shutdown
/// deadline then ends the process.
pub trait PeriodicTask: Send + 'static {
    fn run_once(&mut self) -> impl Future<Output = Result<(), TaskError>> + Send;
}

/// Default task: reports that the daemon is alive.
#[derive(Debug, Default)]
pub struct Heartbeat {
    cycle: u64,
}

impl PeriodicTask for Heartbeat {
    async fn run_once(&mut self) -> Result<(), TaskError> {
        self.cycle += 1;
        info!(cycle = self.cycle, "daemon is running");
        Ok(())
    }
}

/// Why the worker loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The stop signal fired (or its writer went away).
    StopRequested,
    /// A task failure ended the loop under [`FailurePolicy::Abort`].
    Aborted,
}

/// What the worker did before returning. Delivered through the completion token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Number of times the task ran.
    pub cycles: u64,
    /// Number of runs that returned an error.
    pub failures: u64,
    pub exit: WorkerExit,
}

/// Run `task` every `tick_interval` until `stop` fires.
///
/// The first run happens one full interval after start. When a tick is due at
/// the same moment the stop signal fires, either may win.
pub async fn run<T: PeriodicTask>(
    mut task: T,
    tick_interval: Duration,
    on_failure: FailurePolicy,
    mut stop: StopListener,
) -> WorkerSummary {
    let mut ticker = time::interval_at(Instant::now() + tick_interval, tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut cycles = 0u64;
    let mut failures = 0u64;

    let exit = loop {
        tokio::select! {
            _ = stop.stopped() => {
                info!("stopping daemon");
                break WorkerExit::StopRequested;
            }
            _ = ticker.tick() => {
                cycles += 1;
                let Err(err) = task.run_once().await else {
                    continue;
                };
                failures += 1;
                match on_failure {
                    FailurePolicy::Continue => {
                        warn!(error = %err, cycle = cycles, "periodic task failed, continuing");
                    }
                    FailurePolicy::Abort => {
                        error!(error = %err, cycle = cycles, "periodic task failed, aborting worker");
                        break WorkerExit::Aborted;
                    }
                }
            }
        }
    };

    WorkerSummary {
        cycles,
        failures,
        exit,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Tasks used by tests across the crate.
    use super::{PeriodicTask, TaskError};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Counts runs and optionally takes time or fails.
    #[derive(Clone, Default)]
    pub struct CountingTask {
        pub runs: Arc<AtomicU64>,
        pub work: Duration,
        pub fail: bool,
    }

    impl CountingTask {
        pub fn runs(&self) -> u64 {
            self.runs.load(Ordering::SeqCst)
        }
    }

    impl PeriodicTask for CountingTask {
        async fn run_once(&mut self) -> Result<(), TaskError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if !self.work.is_zero() {
                tokio::time::sleep(self.work).await;
            }
            if self.fail {
                return Err("simulated failure".into());
            }
            Ok(())
        }
    }

    /// Never finishes its first run.
    pub struct StuckTask;

    impl PeriodicTask for StuckTask {
        async fn run_once(&mut self) -> Result<(), TaskError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }
}

/// Signal handling for graceful shutdown.
///
/// Handles SIGINT (Ctrl-C) and SIGTERM. SIGKILL cannot be intercepted by any
/// process and always ends the daemon immediately.
/// First signal: fire the stop signal, then allow the shutdown deadline for
/// the worker to finish before forcing the process to exit.
/// Later signals are absorbed by the installed handlers and otherwise ignored.
use crate::status::{DaemonState, StateReporter};
use crate::stop::StopSignal;
use nix::sys::signal::Signal;
use std::future::Future;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

/// Where termination requests come from.
pub trait TerminationSource: Send + 'static {
    /// Wait for the next request. `None` means the source is gone for good.
    fn recv(&mut self) -> impl Future<Output = Option<Signal>> + Send;
}

/// Termination requests delivered by the operating system.
pub struct OsSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

impl OsSignals {
    /// Register the SIGINT and SIGTERM handlers.
    ///
    /// From here on those signals no longer kill the process by default.
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }
}

impl TerminationSource for OsSignals {
    async fn recv(&mut self) -> Option<Signal> {
        tokio::select! {
            received = self.interrupt.recv() => received.map(|()| Signal::SIGINT),
            received = self.terminate.recv() => received.map(|()| Signal::SIGTERM),
        }
    }
}

/// In-process requests, for embedding the daemon or driving it from tests.
impl TerminationSource for mpsc::UnboundedReceiver<Signal> {
    async fn recv(&mut self) -> Option<Signal> {
        mpsc::UnboundedReceiver::recv(self).await
    }
}

/// Ends the process once the shutdown deadline has passed.
pub trait Terminator: Send + Sync + 'static {
    fn terminate(&self, code: i32);
}

/// Production terminator: exits the process immediately.
pub struct ProcessExit;

impl Terminator for ProcessExit {
    fn terminate(&self, code: i32) {
        std::process::exit(code);
    }
}

/// Waits for the first termination request and enforces the shutdown deadline.
pub struct SignalListener<S, T> {
    source: S,
    stop: StopSignal,
    deadline: Duration,
    forced_exit_code: i32,
    terminator: T,
    reporter: StateReporter,
}

impl<S: TerminationSource, T: Terminator> SignalListener<S, T> {
    pub fn new(
        source: S,
        stop: StopSignal,
        deadline: Duration,
        forced_exit_code: i32,
        terminator: T,
        reporter: StateReporter,
    ) -> Self {
        Self {
            source,
            stop,
            deadline,
            forced_exit_code,
            terminator,
            reporter,
        }
    }

    /// Run until the deadline forces an exit, or until the source closes.
    ///
    /// Only the first request is read; the deadline is never restarted.
    pub async fn run(mut self) {
        let Some(received) = self.source.recv().await else {
            tracing::debug!("termination source closed, releasing stop signal");
            return;
        };

        tracing::info!(signal = %received, "received signal, stopping daemon");
        if self.stop.fire() {
            self.reporter.transition(DaemonState::StopRequested);
        }

        tokio::time::sleep(self.deadline).await;

        tracing::warn!(
            deadline_ms = self.deadline.as_millis() as u64,
            exit_code = self.forced_exit_code,
            "shutdown deadline elapsed, forcing exit"
        );
        self.reporter.transition(DaemonState::Terminated);
        self.terminator.terminate(self.forced_exit_code);
    }
}

/// Test terminator: reports the exit code instead of exiting.
#[cfg(test)]
impl Terminator for mpsc::UnboundedSender<i32> {
    fn terminate(&self, code: i32) {
        let _ = self.send(code);
    }
}

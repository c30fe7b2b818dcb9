/// Process lifecycle state, observable in-process and through an optional status file.
///
/// The status file is rewritten as JSON on every accepted transition using the
/// atomic write pattern: write to temp file then rename.
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// Daemon lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonState {
    Idle,
    Running,
    StopRequested,
    Stopped,
    Terminated,
}

impl DaemonState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: DaemonState) -> bool {
        use DaemonState::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Running, StopRequested)
                | (Running, Stopped)
                | (StopRequested, Stopped)
                | (StopRequested, Terminated)
        )
    }

    #[allow(dead_code)]
    pub fn is_terminal(self) -> bool {
        matches!(self, DaemonState::Stopped | DaemonState::Terminated)
    }
}

/// The JSON payload written to the status file.
#[derive(Debug, Clone, Serialize)]
pub struct StatusData {
    pub pid: u32,
    pub state: DaemonState,
    pub started_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub tick_interval_ms: u64,
    pub shutdown_deadline_ms: u64,
}

/// Manages the status file on disk.
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Atomically write status data to the status file.
    ///
    /// Writes to a temporary file in the same directory, then renames
    /// so readers never see a partial write.
    pub fn write(&self, data: &StatusData) -> Result<(), StatusError> {
        let json =
            serde_json::to_string_pretty(data).map_err(|e| StatusError::Serialize { source: e })?;

        let dir = self.path.parent().unwrap_or(Path::new("."));
        let tmp_path = dir.join(format!(".tickd.status.tmp.{}", std::process::id()));

        std::fs::write(&tmp_path, json.as_bytes()).map_err(|e| StatusError::Write {
            path: tmp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&tmp_path, &self.path).map_err(|e| StatusError::Rename {
            from: tmp_path,
            to: self.path.clone(),
            source: e,
        })?;

        Ok(())
    }

    /// Remove the status file (on clean shutdown).
    pub fn remove(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

struct Reporter {
    state: watch::Sender<DaemonState>,
    file: Option<StatusFile>,
    pid: u32,
    started_at: DateTime<Utc>,
    tick_interval_ms: u64,
    shutdown_deadline_ms: u64,
}

/// Shared handle that records lifecycle transitions.
///
/// Cloned into the coordinator and the signal listener. Illegal transitions
/// (including anything after a terminal state) are ignored.
#[derive(Clone)]
pub struct StateReporter {
    inner: Arc<Reporter>,
}

impl StateReporter {
    /// Create a reporter in the `Idle` state. `status_path` enables the status file.
    pub fn new(status_path: Option<PathBuf>, tick_interval_ms: u64, shutdown_deadline_ms: u64) -> Self {
        let (state, _rx) = watch::channel(DaemonState::Idle);
        Self {
            inner: Arc::new(Reporter {
                state,
                file: status_path.map(StatusFile::new),
                pid: std::process::id(),
                started_at: Utc::now(),
                tick_interval_ms,
                shutdown_deadline_ms,
            }),
        }
    }

    #[allow(dead_code)]
    pub fn current(&self) -> DaemonState {
        *self.inner.state.borrow()
    }

    /// Watch transitions as they happen.
    #[allow(dead_code)]
    pub fn subscribe(&self) -> watch::Receiver<DaemonState> {
        self.inner.state.subscribe()
    }

    /// Move to `next` if the state machine allows it.
    ///
    /// Returns whether the transition was accepted.
    pub fn transition(&self, next: DaemonState) -> bool {
        let mut from = DaemonState::Idle;
        let accepted = self.inner.state.send_if_modified(|current| {
            from = *current;
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });

        if !accepted {
            tracing::debug!(from = ?from, to = ?next, "ignoring lifecycle transition");
            return false;
        }
        tracing::debug!(from = ?from, to = ?next, "lifecycle transition");
        self.persist(next);
        true
    }

    fn persist(&self, state: DaemonState) {
        let Some(file) = &self.inner.file else {
            return;
        };

        if state == DaemonState::Stopped {
            file.remove();
            return;
        }

        let data = StatusData {
            pid: self.inner.pid,
            state,
            started_at: self.inner.started_at,
            last_update: Utc::now(),
            tick_interval_ms: self.inner.tick_interval_ms,
            shutdown_deadline_ms: self.inner.shutdown_deadline_ms,
        };
        if let Err(e) = file.write(&data) {
            tracing::warn!(error = %e, "failed to write status file");
        }
    }
}

/// Errors from status file operations.
#[derive(Debug)]
pub enum StatusError {
    Serialize {
        source: serde_json::Error,
    },
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusError::Serialize { source } => write!(f, "failed to serialize status: {source}"),
            StatusError::Write { path, source } => {
                write!(
                    f,
                    "failed to write temp status file {}: {source}",
                    path.display()
                )
            }
            StatusError::Rename { from, to, source } => {
                write!(
                    f,
                    "failed to rename {} -> {}: {source}",
                    from.display(),
                    to.display()
                )
            }
        }
    }
}

impl std::error::Error for StatusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StatusError::Serialize { source } => Some(source),
            StatusError::Write { source, .. } => Some(source),
            StatusError::Rename { source, .. } => Some(source),
        }
    }
}

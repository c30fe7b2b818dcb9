use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "tickd.toml";

/// Top-level configuration loaded from tickd.toml.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct DaemonConfig {
    pub worker: WorkerConfig,
    pub shutdown: ShutdownConfig,
    pub status: StatusConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub tick_interval_ms: u64,
    pub on_failure: FailurePolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    pub deadline_ms: u64,
    pub forced_exit_code: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct StatusConfig {
    pub file: Option<PathBuf>,
}

/// What the worker loop does when a periodic action returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and keep ticking.
    #[default]
    Continue,
    /// Leave the loop as if a stop had been requested.
    Abort,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub tick_interval_ms: Option<u64>,
    pub deadline_ms: Option<u64>,
    pub status_file: Option<PathBuf>,
}

// --- Default implementations ---

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 2_000,
            on_failure: FailurePolicy::Continue,
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 5_000,
            forced_exit_code: 0,
        }
    }
}

impl WorkerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl ShutdownConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

impl DaemonConfig {
    /// Parse a config from TOML text. `origin` is only used for error messages.
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            source: e,
        })
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `tickd.toml` in the working
    /// directory is used when present, otherwise the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    tracing::debug!("no config file found, using defaults");
                    return Ok(Self::default());
                }
                fallback
            }
        };

        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.clone(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Self::from_toml(&text, &path)
    }

    /// Apply CLI overrides on top of file values.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(ms) = overrides.tick_interval_ms {
            self.worker.tick_interval_ms = ms;
        }
        if let Some(ms) = overrides.deadline_ms {
            self.shutdown.deadline_ms = ms;
        }
        if let Some(path) = overrides.status_file {
            self.status.file = Some(path);
        }
    }

    /// Reject settings the runtime cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "worker.tick_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Errors from loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Invalid {
        field: &'static str,
        reason: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {source}", path.display())
            }
            ConfigError::Invalid { field, reason } => {
                write!(f, "invalid config value {field}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::default();
        assert_eq!(config.worker.tick_interval(), Duration::from_secs(2));
        assert_eq!(config.worker.on_failure, FailurePolicy::Continue);
        assert_eq!(config.shutdown.deadline(), Duration::from_secs(5));
        assert_eq!(config.shutdown.forced_exit_code, 0);
        assert!(config.status.file.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = DaemonConfig::from_toml("", Path::new("tickd.toml")).unwrap();
        assert_eq!(config.worker.tick_interval_ms, 2_000);
        assert_eq!(config.shutdown.deadline_ms, 5_000);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let text = r#"
[shutdown]
deadline_ms = 200
"#;
        let config = DaemonConfig::from_toml(text, Path::new("tickd.toml")).unwrap();
        assert_eq!(config.shutdown.deadline_ms, 200);
        assert_eq!(config.shutdown.forced_exit_code, 0);
        assert_eq!(config.worker.tick_interval_ms, 2_000);
    }

    #[test]
    fn test_full_file() {
        let text = r#"
[worker]
tick_interval_ms = 50
on_failure = "abort"

[shutdown]
deadline_ms = 200
forced_exit_code = 3

[status]
file = "/run/tickd.status"
"#;
        let config = DaemonConfig::from_toml(text, Path::new("tickd.toml")).unwrap();
        assert_eq!(config.worker.tick_interval(), Duration::from_millis(50));
        assert_eq!(config.worker.on_failure, FailurePolicy::Abort);
        assert_eq!(config.shutdown.deadline(), Duration::from_millis(200));
        assert_eq!(config.shutdown.forced_exit_code, 3);
        assert_eq!(
            config.status.file.as_deref(),
            Some(Path::new("/run/tickd.status"))
        );
    }

    #[test]
    fn test_unknown_failure_policy_is_parse_error() {
        let text = r#"
[worker]
on_failure = "retry"
"#;
        let err = DaemonConfig::from_toml(text, Path::new("custom.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("custom.toml"));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tickd.toml");
        std::fs::write(&path, "[worker]\ntick_interval_ms = 75\n").unwrap();

        let config = DaemonConfig::load(Some(&path)).unwrap();
        assert_eq!(config.worker.tick_interval_ms, 75);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        let err = DaemonConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("missing.toml"));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut config = DaemonConfig::default();
        config.apply(Overrides {
            tick_interval_ms: Some(10),
            deadline_ms: None,
            status_file: Some(PathBuf::from("state.json")),
        });
        assert_eq!(config.worker.tick_interval_ms, 10);
        assert_eq!(config.shutdown.deadline_ms, 5_000);
        assert_eq!(config.status.file, Some(PathBuf::from("state.json")));
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let mut config = DaemonConfig::default();
        config.worker.tick_interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("worker.tick_interval_ms"));
    }

    #[test]
    fn test_zero_deadline_allowed() {
        let mut config = DaemonConfig::default();
        config.shutdown.deadline_ms = 0;
        assert!(config.validate().is_ok());
    }
}

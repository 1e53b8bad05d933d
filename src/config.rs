//! Configuration management for execlog.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::execution::StreamOrdering;
use crate::session::SessionSettings;

const APP_DIR: &str = "execlog";

/// Application data directory (`<data dir>/execlog`).
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Default transcript directory.
pub fn default_log_dir() -> PathBuf {
    data_dir().join("command_logs")
}

/// Default directory for imported executables.
pub fn default_binaries_dir() -> PathBuf {
    data_dir().join("binaries")
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Process execution settings.
    pub execution: ExecutionSection,
    /// Transcript settings.
    pub transcript: TranscriptSection,
    /// Imported executables.
    pub binaries: BinariesSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Execution configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    /// Execution-time ceiling in seconds.
    pub timeout_secs: u64,
    /// Ordering of stdout and stderr lines in the transcript.
    pub ordering: StreamOrdering,
    /// Drain grace period after the process ends, in milliseconds.
    pub drain_grace_ms: u64,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            timeout_secs: crate::execution::DEFAULT_TIMEOUT.as_secs(),
            ordering: StreamOrdering::default(),
            drain_grace_ms: crate::execution::DEFAULT_DRAIN_GRACE.as_millis() as u64,
        }
    }
}

/// Transcript configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptSection {
    /// Directory for transcript files (platform data dir when unset).
    pub log_dir: Option<PathBuf>,
    /// Prepend the command line to each transcript file.
    pub include_command: bool,
}

/// Imported executables configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BinariesSection {
    /// Directory imported executables are copied to.
    pub dir: Option<PathBuf>,
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(timeout) = std::env::var("EXECLOG_TIMEOUT") {
            self.execution.timeout_secs = timeout
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EXECLOG_TIMEOUT", timeout))?;
        }

        if let Ok(dir) = std::env::var("EXECLOG_LOG_DIR") {
            if !dir.is_empty() {
                self.transcript.log_dir = Some(PathBuf::from(dir));
            }
        }

        if let Ok(level) = std::env::var("EXECLOG_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(timeout) = args.timeout_secs {
            self.execution.timeout_secs = timeout;
        }

        if args.arrival_order {
            self.execution.ordering = StreamOrdering::Arrival;
        }

        if let Some(ref dir) = args.log_dir {
            self.transcript.log_dir = Some(dir.clone());
        }

        if args.with_command {
            self.transcript.include_command = true;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env()?;
        config.apply_args(args);
        config.validate()?;

        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.execution.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("timeout", "0".to_string()));
        }
        Ok(())
    }

    /// Effective transcript directory.
    pub fn log_dir(&self) -> PathBuf {
        self.transcript.log_dir.clone().unwrap_or_else(default_log_dir)
    }

    /// Effective binaries directory.
    pub fn binaries_dir(&self) -> PathBuf {
        self.binaries.dir.clone().unwrap_or_else(default_binaries_dir)
    }

    /// Convert to per-run session settings.
    pub fn to_session_settings(&self) -> SessionSettings {
        SessionSettings::default()
            .timeout(Duration::from_secs(self.execution.timeout_secs))
            .ordering(self.execution.ordering)
            .drain_grace(Duration::from_millis(self.execution.drain_grace_ms))
            .log_dir(self.log_dir())
            .include_command(self.transcript.include_command)
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid setting value.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidValue(name, value) => write!(f, "invalid value for {}: '{}'", name, value),
        }
    }
}

impl std::error::Error for ConfigError {}

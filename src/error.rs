//! Error types for execlog.

use std::path::PathBuf;

use thiserror::Error;

use crate::session::SessionState;
use crate::transcript::Origin;

/// Main error type for execlog operations.
#[derive(Error, Debug)]
pub enum ExecLogError {
    /// The resolved command contains no program to run.
    #[error("empty command: nothing to execute")]
    EmptyCommand,

    /// The command could not be launched.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// One of the child's output streams became unreadable.
    #[error("failed to read {stream}: {source}")]
    StreamRead {
        stream: Origin,
        source: std::io::Error,
    },

    /// The transcript could not be persisted.
    #[error("failed to write transcript {}: {source}", path.display())]
    TranscriptWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An executable could not be copied into the binaries directory.
    #[error("failed to import executable {}: {source}", path.display())]
    Import {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid lifecycle transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition { from: SessionState, to: SessionState },

    /// A background task died before handing back its result.
    #[error("background task failed: {0}")]
    Task(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecLogError {
    /// Whether this error means the command never started.
    pub fn is_spawn_error(&self) -> bool {
        matches!(self, Self::EmptyCommand | Self::Spawn { .. })
    }
}

/// Convenience Result type for execlog operations.
pub type Result<T> = std::result::Result<T, ExecLogError>;

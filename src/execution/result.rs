//! Run outcome types.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::error::ExecLogError;
use crate::transcript::Transcript;

/// Status reported to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    /// The process is still running (transient).
    Running,
    /// The process exited on its own, whatever its exit code.
    Completed,
    /// The timeout guard fired and the process was killed.
    TimedOut,
    /// The run was cancelled and the process was killed.
    Cancelled,
    /// The command could not be launched.
    SpawnFailed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    /// Whether the process had to be killed.
    pub fn was_terminated(&self) -> bool {
        matches!(self, RunStatus::TimedOut | RunStatus::Cancelled)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::TimedOut => "timed out",
            RunStatus::Cancelled => "cancelled",
            RunStatus::SpawnFailed => "spawn failed",
        };
        f.write_str(name)
    }
}

/// What happened to the transcript file.
#[derive(Debug)]
pub enum LogOutcome {
    /// Written to this path.
    Saved(PathBuf),
    /// Writing failed; the run's status is unaffected.
    Failed(ExecLogError),
    /// Nothing was written (the command never started).
    Skipped,
}

impl LogOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            LogOutcome::Saved(path) => Some(path),
            _ => None,
        }
    }

    pub fn warning(&self) -> Option<&ExecLogError> {
        match self {
            LogOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Final account of one session.
#[derive(Debug)]
pub struct SessionReport {
    /// The command line that was run.
    pub command: String,
    pub status: RunStatus,
    /// OS process id of the child, if it was spawned.
    pub pid: Option<u32>,
    /// Exit code, when the process exited normally.
    pub exit_code: Option<i32>,
    pub transcript: Transcript,
    pub log: LogOutcome,
    /// Why the command could not be launched.
    pub spawn_error: Option<ExecLogError>,
    /// Wall-clock start; also names the transcript file.
    pub started_at: DateTime<Local>,
    pub duration: Duration,
}

impl SessionReport {
    /// Whether the process exited on its own with code 0.
    pub fn success(&self) -> bool {
        self.status == RunStatus::Completed && self.exit_code == Some(0)
    }

    pub fn transcript_path(&self) -> Option<&Path> {
        self.log.path()
    }

    /// Exit code for a front end reporting this run as a process.
    ///
    /// The child's own code when it completed (1 if it died from a signal),
    /// 124 on timeout, 130 on cancel, 127 when it never started.
    pub fn process_exit_code(&self) -> u8 {
        match self.status {
            RunStatus::Completed => match self.exit_code {
                Some(code) => u8::try_from(code).unwrap_or(1),
                None => 1,
            },
            RunStatus::TimedOut => 124,
            RunStatus::Cancelled => 130,
            RunStatus::SpawnFailed => 127,
            RunStatus::Running => 1,
        }
    }
}

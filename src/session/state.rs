//! Session state machine.

use crate::execution::RunStatus;

/// Lifecycle state of an execution session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Created, not started yet.
    #[default]
    Idle,
    /// Launching the child process.
    Spawning,
    /// The child is running and its output is being relayed.
    Running,
    /// The child exited on its own.
    Completed,
    /// The timeout guard killed the child.
    TimedOut,
    /// The child was killed on request.
    Cancelled,
    /// The child could not be launched.
    SpawnFailed,
    /// The transcript has been handled; the session is over.
    LoggingDone,
}

impl SessionState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Idle -> Spawning
    /// - Spawning -> Running | SpawnFailed
    /// - Running -> Completed | TimedOut | Cancelled
    /// - Completed | TimedOut | Cancelled -> LoggingDone
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (*self, target),
            (Idle, Spawning)
                | (Spawning, Running)
                | (Spawning, SpawnFailed)
                | (Running, Completed)
                | (Running, TimedOut)
                | (Running, Cancelled)
                | (Completed, LoggingDone)
                | (TimedOut, LoggingDone)
                | (Cancelled, LoggingDone)
        )
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: SessionState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::ExecLogError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::SpawnFailed | SessionState::LoggingDone)
    }

    /// Check if the session can be cancelled.
    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Running)
    }

    /// The externally visible status for this state, if it maps to one.
    pub fn run_status(&self) -> Option<RunStatus> {
        match self {
            SessionState::Running => Some(RunStatus::Running),
            SessionState::Completed => Some(RunStatus::Completed),
            SessionState::TimedOut => Some(RunStatus::TimedOut),
            SessionState::Cancelled => Some(RunStatus::Cancelled),
            SessionState::SpawnFailed => Some(RunStatus::SpawnFailed),
            SessionState::Idle | SessionState::Spawning | SessionState::LoggingDone => None,
        }
    }
}

impl From<RunStatus> for SessionState {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Running => SessionState::Running,
            RunStatus::Completed => SessionState::Completed,
            RunStatus::TimedOut => SessionState::TimedOut,
            RunStatus::Cancelled => SessionState::Cancelled,
            RunStatus::SpawnFailed => SessionState::SpawnFailed,
        }
    }
}

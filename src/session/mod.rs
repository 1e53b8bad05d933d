//! Execution sessions.
//!
//! An [`ExecutionSession`] coordinates one run: spawn, relay, timeout,
//! cancellation, and transcript persistence. Its lifecycle follows
//! [`SessionState`]:
//!
//! ```text
//! Idle -> Spawning -> Running -> {Completed, TimedOut, Cancelled} -> LoggingDone
//!                  \-> SpawnFailed
//! ```

mod engine;
mod state;

pub use engine::{CancelHandle, ExecutionSession, RunningSession, SessionSettings};
pub use state::SessionState;

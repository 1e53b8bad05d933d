//! Process execution engine.
//!
//! The building blocks of a run:
//! - [`ProcessSupervisor`] spawns the child and kills it
//! - [`StreamRelay`] drains stdout/stderr into a transcript
//! - [`TimeoutGuard`] enforces the execution-time ceiling
//! - [`CommandResolver`] builds the command line from user input
//!
//! [`crate::session::ExecutionSession`] ties them together.
//!
//! # Example
//!
//! ```no_run
//! use execlog::execution::{CommandResolver, ProcessSupervisor};
//!
//! # async fn demo() -> execlog::Result<()> {
//! let command = CommandResolver::new().resolve("echo hello")?;
//! let mut handle = ProcessSupervisor::new().spawn(&command)?;
//! handle.terminate();
//! handle.terminate(); // no-op
//! # Ok(())
//! # }
//! ```

mod command;
mod guard;
mod relay;
mod resolver;
mod result;
mod supervisor;

pub use command::Command;
pub use guard::{TimeoutGuard, DEFAULT_TIMEOUT};
pub use relay::{
    RelayHandle, StreamOrdering, StreamRelay, DEFAULT_DRAIN_GRACE, DEFAULT_HELD_LIMIT,
    MAX_LINE_BYTES,
};
pub use resolver::{import_executable, CommandResolver};
pub use result::{LogOutcome, RunStatus, SessionReport};
pub use supervisor::{ProcessHandle, ProcessSupervisor};

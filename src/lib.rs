//! # execlog
//!
//! Run a command line as a child process, relay its output live, enforce an
//! execution-time ceiling, and keep a plain-text transcript of every run.
//!
//! ## Features
//!
//! - **Live relay**: stdout and stderr are read concurrently; stderr lines
//!   carry an `ERROR: ` marker
//! - **Hard timeout**: the child is killed once the limit (30s by default)
//!   is exceeded
//! - **Cancellation**: a running command can be killed on request
//! - **Transcripts**: one `<command>_<yyyyMMdd_HHmmss>.txt` file per run
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use execlog::{ConsoleSink, ExecutionSession, SessionSettings};
//!
//! #[tokio::main]
//! async fn main() {
//!     execlog::logging::try_init().ok();
//!
//!     let report = ExecutionSession::new("ls -la /tmp", SessionSettings::default())
//!         .with_sink(Arc::new(ConsoleSink))
//!         .run()
//!         .await;
//!
//!     println!("{} -> {:?}", report.status, report.transcript_path());
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod logging;
pub mod output;
pub mod session;
pub mod transcript;

// Re-export commonly used types
pub use error::{ExecLogError, Result};
pub use execution::{Command, CommandResolver, LogOutcome, RunStatus, SessionReport};
pub use output::{CollectingSink, ConsoleSink, NullSink, OutputSink};
pub use session::{CancelHandle, ExecutionSession, RunningSession, SessionSettings, SessionState};
pub use transcript::{Transcript, TranscriptLine, TranscriptWriter};

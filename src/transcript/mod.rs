//! Transcript capture and persistence.
//!
//! A [`Transcript`] is the ordered record of every line a run printed,
//! each tagged with its [`Origin`]. [`TranscriptWriter`] stores it as one
//! text file per run, named from the sanitized command and the start time:
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use execlog::transcript::file_name;
//!
//! let ts = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
//! assert_eq!(file_name("echo hello", &ts), "echo_hello_20240101_120000.txt");
//! ```

mod record;
mod writer;

pub use record::{Origin, Transcript, TranscriptLine, ERROR_MARKER};
pub use writer::{file_name, sanitize, TranscriptWriter, TRANSCRIPT_EXTENSION};

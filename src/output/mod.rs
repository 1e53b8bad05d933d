//! Output delivery.
//!
//! Relayed lines and the final report are pushed to an [`OutputSink`]:
//! - [`ConsoleSink`] for the command-line front end
//! - [`CollectingSink`] for embedding and tests
//! - [`NullSink`] when nobody is watching
//!
//! # Example
//!
//! ```
//! use execlog::output::{CollectingSink, OutputSink};
//!
//! let sink = CollectingSink::new();
//! sink.on_line("ERROR: disk full", true);
//! assert_eq!(sink.lines(), vec![("ERROR: disk full".to_string(), true)]);
//! ```

mod sink;

pub use sink::{notices, CollectingSink, ConsoleSink, NullSink, OutputSink};

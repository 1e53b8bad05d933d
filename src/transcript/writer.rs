//! Persisting transcripts to the log directory.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use tracing::{debug, warn};

use super::record::Transcript;
use crate::error::ExecLogError;
use crate::Result;

/// Extension of every transcript file.
pub const TRANSCRIPT_EXTENSION: &str = "txt";

/// Timestamp layout used in file names (`yyyyMMdd_HHmmss`).
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Replace every character outside `[A-Za-z0-9]` with `_`.
pub fn sanitize(command: &str) -> String {
    command
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// File name for a run of `command` started at `timestamp`.
pub fn file_name<Tz>(command: &str, timestamp: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}_{}.{}",
        sanitize(command),
        timestamp.format(TIMESTAMP_FORMAT),
        TRANSCRIPT_EXTENSION
    )
}

/// Writes one transcript file per run.
#[derive(Debug, Clone)]
pub struct TranscriptWriter {
    dir: PathBuf,
    include_command: bool,
}

impl TranscriptWriter {
    /// Create a writer targeting `dir`. The directory is created on first use.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            include_command: false,
        }
    }

    /// Prepend a `$ <command>` header line to every file.
    pub fn include_command(mut self, include: bool) -> Self {
        self.include_command = include;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The exact bytes [`persist`](Self::persist) writes.
    pub fn contents(&self, command: &str, transcript: &Transcript) -> String {
        let body = transcript.render();
        if self.include_command {
            format!("$ {command}\n{body}")
        } else {
            body
        }
    }

    /// Persist `transcript` and return the path of the written file.
    ///
    /// A file from the same command in the same second is overwritten.
    pub async fn persist<Tz>(
        &self,
        command: &str,
        transcript: &Transcript,
        timestamp: &DateTime<Tz>,
    ) -> Result<PathBuf>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|source| {
            warn!(dir = %self.dir.display(), error = %source, "cannot create log directory");
            ExecLogError::TranscriptWrite {
                path: self.dir.clone(),
                source,
            }
        })?;

        let path = self.dir.join(file_name(command, timestamp));
        let contents = self.contents(command, transcript);

        tokio::fs::write(&path, contents.as_bytes())
            .await
            .map_err(|source| ExecLogError::TranscriptWrite {
                path: path.clone(),
                source,
            })?;

        debug!(
            path = %path.display(),
            bytes = contents.len(),
            lines = transcript.len(),
            "transcript saved"
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::TranscriptLine;
    use chrono::{Local, Utc};

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).single().unwrap()
    }

    fn hello() -> Transcript {
        [TranscriptLine::stdout("hello")].into_iter().collect()
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("echo hello"), "echo_hello");
        assert_eq!(sanitize("/bin/false"), "_bin_false");
        assert_eq!(sanitize("ls -la ./dir"), "ls__la___dir");
        assert_eq!(sanitize("AbC123"), "AbC123");
        assert_eq!(sanitize("café"), "caf_");
    }

    #[test]
    fn test_file_name_layout() {
        let ts = at(2024, 3, 7, 9, 5, 1);
        assert_eq!(file_name("echo hello", &ts), "echo_hello_20240307_090501.txt");
    }

    #[test]
    fn test_contents_with_header() {
        let writer = TranscriptWriter::new("/unused").include_command(true);
        assert_eq!(writer.contents("echo hello", &hello()), "$ echo hello\nhello\n");

        let plain = TranscriptWriter::new("/unused");
        assert_eq!(plain.contents("echo hello", &hello()), "hello\n");
    }

    #[tokio::test]
    async fn test_persist_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(dir.path());

        let transcript: Transcript = [
            TranscriptLine::stdout("out 1"),
            TranscriptLine::stdout("out 2"),
            TranscriptLine::stderr("err 1"),
        ]
        .into_iter()
        .collect();

        let path = writer
            .persist("demo cmd", &transcript, &at(2024, 1, 1, 12, 0, 0))
            .await
            .unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "demo_cmd_20240101_120000.txt"
        );
        let written = std::fs::read(&path).unwrap();
        assert_eq!(written, b"out 1\nout 2\nERROR: err 1\n");
    }

    #[tokio::test]
    async fn test_persist_creates_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("command_logs");
        let writer = TranscriptWriter::new(&nested);

        let path = writer
            .persist("echo hello", &hello(), &Local::now())
            .await
            .unwrap();

        assert!(nested.is_dir());
        assert!(path.starts_with(&nested));
    }

    #[tokio::test]
    async fn test_distinct_timestamps_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(dir.path());

        let first = writer
            .persist("echo hello", &hello(), &at(2024, 1, 1, 12, 0, 0))
            .await
            .unwrap();
        let second = writer
            .persist("echo hello", &hello(), &at(2024, 1, 1, 12, 0, 1))
            .await
            .unwrap();

        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());
    }

    #[tokio::test]
    async fn test_persist_failure_is_typed() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the directory should be.
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();

        let writer = TranscriptWriter::new(&blocker);
        let err = writer
            .persist("echo hello", &hello(), &Local::now())
            .await
            .unwrap_err();

        assert!(matches!(err, ExecLogError::TranscriptWrite { .. }));
    }
}

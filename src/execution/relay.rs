//! Draining a child's output streams into a transcript.
//!
//! Each stream gets its own reader task; both feed a single collector
//! task that owns the [`Transcript`] and forwards every line to the
//! [`OutputSink`]. Readers never block the caller.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::ExecLogError;
use crate::output::OutputSink;
use crate::transcript::{Origin, Transcript, TranscriptLine};
use crate::Result;

/// Default time the relay gets to drain after the process is gone.
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Default cap on stderr lines held back while stdout is still open.
pub const DEFAULT_HELD_LIMIT: usize = 100_000;

/// Longest line recorded as one entry; longer output is split.
pub const MAX_LINE_BYTES: usize = 1 << 20;

const CHANNEL_CAPACITY: usize = 64;

/// Order in which lines from the two streams are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamOrdering {
    /// Every stdout line precedes every stderr line.
    ///
    /// Both streams are still read concurrently; stderr lines are held
    /// back until stdout reaches end-of-stream. Past the relay's held limit
    /// the hold is released with a marker line and the rest of the run is
    /// recorded in arrival order.
    #[default]
    StdoutFirst,
    /// Lines are recorded in the order they arrive.
    Arrival,
}

#[derive(Debug)]
enum RelayEvent {
    Line { from: Origin, line: TranscriptLine },
    Closed(Origin),
}

/// Spawns the reader and collector tasks for one process.
pub struct StreamRelay {
    ordering: StreamOrdering,
    sink: Arc<dyn OutputSink>,
    held_limit: usize,
}

impl StreamRelay {
    pub fn new(ordering: StreamOrdering, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            ordering,
            sink,
            held_limit: DEFAULT_HELD_LIMIT,
        }
    }

    /// Cap the number of stderr lines held back under `StdoutFirst`.
    pub fn held_limit(mut self, limit: usize) -> Self {
        self.held_limit = limit;
        self
    }

    /// Start draining. A `None` stream counts as already closed.
    pub fn start<O, E>(self, stdout: Option<O>, stderr: Option<E>) -> RelayHandle
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let stop = CancellationToken::new();
        let stdout_open = stdout.is_some();

        if let Some(stdout) = stdout {
            tokio::spawn(drain(Origin::Stdout, stdout, tx.clone(), stop.clone()));
        }
        if let Some(stderr) = stderr {
            tokio::spawn(drain(Origin::Stderr, stderr, tx.clone(), stop.clone()));
        }
        drop(tx);

        let task = tokio::spawn(collect(
            rx,
            self.ordering,
            self.sink,
            stdout_open,
            self.held_limit,
        ));
        RelayHandle { stop, task }
    }
}

/// Running relay. The collector ends once both readers are done.
pub struct RelayHandle {
    stop: CancellationToken,
    task: JoinHandle<Transcript>,
}

impl RelayHandle {
    /// Wait for the relay to drain and hand over the transcript.
    ///
    /// If the streams are still open after `grace` (a descendant of the
    /// child inherited the pipes), the readers are stopped and a marker
    /// line records the truncation.
    pub async fn finish(mut self, grace: Duration) -> Result<Transcript> {
        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(joined) => joined.map_err(|e| ExecLogError::Task(e.to_string())),
            Err(_) => {
                warn!(
                    grace_ms = grace.as_millis() as u64,
                    "output streams still open after process exit; stopping relay"
                );
                self.stop.cancel();
                (&mut self.task)
                    .await
                    .map_err(|e| ExecLogError::Task(e.to_string()))
            }
        }
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn drain<R>(origin: Origin, reader: R, tx: mpsc::Sender<RelayEvent>, stop: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let mut limited = (&mut reader).take(MAX_LINE_BYTES as u64);
        let read = tokio::select! {
            biased;
            () = stop.cancelled() => {
                let line = TranscriptLine::relay(format!("{origin} still open; output truncated"));
                let _ = tx.send(RelayEvent::Line { from: origin, line }).await;
                break;
            }
            read = limited.read_until(b'\n', &mut buf) => read,
        };

        match read {
            Ok(0) => {
                trace!(stream = %origin, "end of stream");
                break;
            }
            Ok(_) => {
                let line = TranscriptLine::new(origin, decode_line(&buf));
                if tx.send(RelayEvent::Line { from: origin, line }).await.is_err() {
                    debug!(stream = %origin, "relay collector gone");
                    return;
                }
            }
            Err(source) => {
                let err = ExecLogError::StreamRead {
                    stream: origin,
                    source,
                };
                warn!(stream = %origin, error = %err, "stream read failed");
                let line = TranscriptLine::relay(err.to_string());
                let _ = tx.send(RelayEvent::Line { from: origin, line }).await;
                break;
            }
        }
    }

    let _ = tx.send(RelayEvent::Closed(origin)).await;
}

async fn collect(
    mut rx: mpsc::Receiver<RelayEvent>,
    mut ordering: StreamOrdering,
    sink: Arc<dyn OutputSink>,
    mut stdout_open: bool,
    held_limit: usize,
) -> Transcript {
    let mut transcript = Transcript::new();
    let mut held = Vec::new();

    while let Some(event) = rx.recv().await {
        match event {
            RelayEvent::Line { from, line } => {
                let hold =
                    ordering == StreamOrdering::StdoutFirst && stdout_open && from != Origin::Stdout;
                if hold && held.len() >= held_limit {
                    warn!(held = held.len(), "stdout still open; releasing held stderr lines");
                    let marker = TranscriptLine::relay(format!(
                        "{from} held back past {held_limit} lines; recording in arrival order"
                    ));
                    emit(&mut transcript, sink.as_ref(), marker);
                    for held_line in held.drain(..) {
                        emit(&mut transcript, sink.as_ref(), held_line);
                    }
                    emit(&mut transcript, sink.as_ref(), line);
                    ordering = StreamOrdering::Arrival;
                } else if hold {
                    held.push(line);
                } else {
                    emit(&mut transcript, sink.as_ref(), line);
                }
            }
            RelayEvent::Closed(Origin::Stdout) => {
                stdout_open = false;
                for line in held.drain(..) {
                    emit(&mut transcript, sink.as_ref(), line);
                }
            }
            RelayEvent::Closed(_) => {}
        }
    }

    for line in held {
        emit(&mut transcript, sink.as_ref(), line);
    }

    debug!(lines = transcript.len(), "relay drained");
    transcript
}

fn emit(transcript: &mut Transcript, sink: &dyn OutputSink, line: TranscriptLine) {
    sink.on_line(&line.display_text(), line.is_error());
    transcript.push(line);
}

/// Strip one trailing `\n` (and a preceding `\r`) and decode lossily.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::CollectingSink;
    use std::io::Cursor;

    fn new_relay(ordering: StreamOrdering) -> (StreamRelay, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::new());
        (StreamRelay::new(ordering, sink.clone()), sink)
    }

    fn texts(transcript: &Transcript) -> Vec<String> {
        transcript.lines().iter().map(|l| l.display_text()).collect()
    }

    #[test]
    fn test_decode_line() {
        assert_eq!(decode_line(b"hello\n"), "hello");
        assert_eq!(decode_line(b"hello\r\n"), "hello");
        assert_eq!(decode_line(b"no newline"), "no newline");
        assert_eq!(decode_line(b"\n"), "");
        assert_eq!(decode_line(b"bad \xff byte\n"), "bad \u{fffd} byte");
    }

    #[tokio::test]
    async fn test_stdout_then_stderr() {
        let (relay, sink) = new_relay(StreamOrdering::StdoutFirst);
        let handle = relay.start(
            Some(Cursor::new(b"o1\no2\no3\n".to_vec())),
            Some(Cursor::new(b"e1\ne2\n".to_vec())),
        );

        let transcript = handle.finish(DEFAULT_DRAIN_GRACE).await.unwrap();
        assert_eq!(
            texts(&transcript),
            vec!["o1", "o2", "o3", "ERROR: e1", "ERROR: e2"]
        );
        assert_eq!(
            sink.lines(),
            vec![
                ("o1".to_string(), false),
                ("o2".to_string(), false),
                ("o3".to_string(), false),
                ("ERROR: e1".to_string(), true),
                ("ERROR: e2".to_string(), true),
            ]
        );
    }

    #[tokio::test]
    async fn test_stdout_first_holds_early_stderr() {
        let stdout = tokio_test::io::Builder::new()
            .wait(Duration::from_millis(50))
            .read(b"late out\n")
            .build();
        let stderr = tokio_test::io::Builder::new().read(b"early err\n").build();

        let (relay, _sink) = new_relay(StreamOrdering::StdoutFirst);
        let transcript = relay
            .start(Some(stdout), Some(stderr))
            .finish(DEFAULT_DRAIN_GRACE)
            .await
            .unwrap();

        assert_eq!(texts(&transcript), vec!["late out", "ERROR: early err"]);
    }

    #[tokio::test]
    async fn test_arrival_order() {
        let stdout = tokio_test::io::Builder::new()
            .wait(Duration::from_millis(100))
            .read(b"late out\n")
            .build();
        let stderr = tokio_test::io::Builder::new().read(b"early err\n").build();

        let (relay, _sink) = new_relay(StreamOrdering::Arrival);
        let transcript = relay
            .start(Some(stdout), Some(stderr))
            .finish(DEFAULT_DRAIN_GRACE)
            .await
            .unwrap();

        assert_eq!(texts(&transcript), vec!["ERROR: early err", "late out"]);
    }

    #[tokio::test]
    async fn test_read_failure_recorded_and_other_stream_continues() {
        let stdout = tokio_test::io::Builder::new()
            .read(b"before failure\n")
            .read_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "pipe went away",
            ))
            .build();
        let stderr = Cursor::new(b"still here\n".to_vec());

        let (relay, sink) = new_relay(StreamOrdering::StdoutFirst);
        let transcript = relay
            .start(Some(stdout), Some(stderr))
            .finish(DEFAULT_DRAIN_GRACE)
            .await
            .unwrap();

        assert_eq!(
            texts(&transcript),
            vec![
                "before failure",
                "ERROR: failed to read stdout: pipe went away",
                "ERROR: still here",
            ]
        );
        assert_eq!(transcript.from_origin(Origin::Relay).count(), 1);
        assert_eq!(sink.lines().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_streams() {
        let (relay, sink) = new_relay(StreamOrdering::StdoutFirst);
        let transcript = relay
            .start(None::<Cursor<Vec<u8>>>, Some(Cursor::new(b"only err\n".to_vec())))
            .finish(DEFAULT_DRAIN_GRACE)
            .await
            .unwrap();

        assert_eq!(texts(&transcript), vec!["ERROR: only err"]);
        assert_eq!(sink.lines(), vec![("ERROR: only err".to_string(), true)]);

        let (relay, _) = new_relay(StreamOrdering::StdoutFirst);
        let transcript = relay
            .start(None::<Cursor<Vec<u8>>>, None::<Cursor<Vec<u8>>>)
            .finish(DEFAULT_DRAIN_GRACE)
            .await
            .unwrap();
        assert!(transcript.is_empty());
    }

    #[tokio::test]
    async fn test_unterminated_last_line() {
        let (relay, _) = new_relay(StreamOrdering::StdoutFirst);
        let transcript = relay
            .start(
                Some(Cursor::new(b"first\nlast".to_vec())),
                None::<Cursor<Vec<u8>>>,
            )
            .finish(DEFAULT_DRAIN_GRACE)
            .await
            .unwrap();

        assert_eq!(transcript.render(), "first\nlast\n");
    }

    #[tokio::test]
    async fn test_held_limit_switches_to_arrival() {
        let stdout = tokio_test::io::Builder::new()
            .wait(Duration::from_millis(100))
            .read(b"out\n")
            .build();
        let stderr = tokio_test::io::Builder::new()
            .read(b"e1\ne2\ne3\n")
            .wait(Duration::from_millis(200))
            .read(b"e4\n")
            .build();

        let (relay, _) = new_relay(StreamOrdering::StdoutFirst);
        let transcript = relay
            .held_limit(2)
            .start(Some(stdout), Some(stderr))
            .finish(DEFAULT_DRAIN_GRACE)
            .await
            .unwrap();

        assert_eq!(
            texts(&transcript),
            vec![
                "ERROR: stderr held back past 2 lines; recording in arrival order",
                "ERROR: e1",
                "ERROR: e2",
                "ERROR: e3",
                "out",
                "ERROR: e4",
            ]
        );
    }

    #[tokio::test]
    async fn test_long_line_split() {
        let mut data = vec![b'x'; MAX_LINE_BYTES + 10];
        data.push(b'\n');

        let (relay, _) = new_relay(StreamOrdering::StdoutFirst);
        let transcript = relay
            .start(Some(Cursor::new(data)), None::<Cursor<Vec<u8>>>)
            .finish(DEFAULT_DRAIN_GRACE)
            .await
            .unwrap();

        let lengths: Vec<usize> = transcript.lines().iter().map(|l| l.text.len()).collect();
        assert_eq!(lengths, vec![MAX_LINE_BYTES, 10]);
    }

    #[tokio::test]
    async fn test_grace_period_truncates_open_stream() {
        // The write half stays alive, so the read half never reaches EOF.
        let (_writer, reader) = tokio::io::duplex(64);

        let (relay, _) = new_relay(StreamOrdering::StdoutFirst);
        let transcript = relay
            .start(Some(reader), None::<Cursor<Vec<u8>>>)
            .finish(Duration::from_millis(50))
            .await
            .unwrap();

        assert_eq!(
            texts(&transcript),
            vec!["ERROR: stdout still open; output truncated"]
        );
    }
}

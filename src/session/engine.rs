//! One end-to-end run of a command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::state::SessionState;
use crate::error::ExecLogError;
use crate::execution::{
    Command, LogOutcome, ProcessHandle, ProcessSupervisor, RunStatus, SessionReport,
    StreamOrdering, StreamRelay, TimeoutGuard, DEFAULT_DRAIN_GRACE, DEFAULT_TIMEOUT,
};
use crate::output::{NullSink, OutputSink};
use crate::transcript::{Transcript, TranscriptLine, TranscriptWriter, ERROR_MARKER};
use crate::Result;

/// Per-run tunables.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Execution-time ceiling.
    pub timeout: Duration,
    /// Transcript ordering of stdout and stderr lines.
    pub ordering: StreamOrdering,
    /// How long the relay may keep draining after the process is gone.
    pub drain_grace: Duration,
    /// Directory receiving transcript files.
    pub log_dir: PathBuf,
    /// Prepend `$ <command>` to transcript files.
    pub include_command: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            ordering: StreamOrdering::default(),
            drain_grace: DEFAULT_DRAIN_GRACE,
            log_dir: crate::config::default_log_dir(),
            include_command: false,
        }
    }
}

impl SessionSettings {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn ordering(mut self, ordering: StreamOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn include_command(mut self, include: bool) -> Self {
        self.include_command = include;
        self
    }
}

/// What ended the `Running` phase.
enum Trigger {
    Exited(std::io::Result<std::process::ExitStatus>),
    Cancel,
    Deadline,
}

/// A single-use run of one command.
///
/// Running consumes the session; a new run needs a new session.
pub struct ExecutionSession {
    command: Command,
    settings: SessionSettings,
    sink: Arc<dyn OutputSink>,
    cancel: CancellationToken,
    state: watch::Sender<SessionState>,
}

impl ExecutionSession {
    pub fn new(command: impl Into<Command>, settings: SessionSettings) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            command: command.into(),
            settings,
            sink: Arc::new(NullSink),
            cancel: CancellationToken::new(),
            state,
        }
    }

    /// Deliver live lines and the final report to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// A handle that can cancel this session from any task.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            token: self.cancel.clone(),
            state: self.state.subscribe(),
        }
    }

    /// Run on a background task and return immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> RunningSession {
        let cancel = self.cancel_handle();
        let state = self.subscribe();
        let task = tokio::spawn(self.run());
        RunningSession {
            cancel,
            state,
            task: Some(task),
        }
    }

    /// Run to completion on the current task.
    pub async fn run(self) -> SessionReport {
        let span = info_span!("session", command = %self.command);
        self.drive().instrument(span).await
    }

    async fn drive(self) -> SessionReport {
        let started_at = Local::now();
        let clock = Instant::now();
        self.advance(SessionState::Spawning);

        let mut process = match ProcessSupervisor::new().spawn(&self.command) {
            Ok(process) => process,
            Err(err) => return self.spawn_failed(err, started_at, clock),
        };

        let relay = StreamRelay::new(self.settings.ordering, self.sink.clone())
            .start(process.take_stdout(), process.take_stderr());
        let guard = TimeoutGuard::arm(self.settings.timeout);
        self.advance(SessionState::Running);
        info!(
            pid = process.pid(),
            timeout_secs = self.settings.timeout.as_secs_f64(),
            "command started"
        );

        let (status, exit_code) = self.supervise(&mut process, &guard).await;
        guard.disarm();

        let transcript = match relay.finish(self.settings.drain_grace).await {
            Ok(transcript) => transcript,
            Err(err) => {
                warn!(error = %err, "output relay failed");
                [TranscriptLine::relay(err.to_string())].into_iter().collect()
            }
        };
        self.advance(status.into());

        let log = self.persist(&transcript, &started_at).await;
        self.advance(SessionState::LoggingDone);

        let report = SessionReport {
            command: self.command.command_line.clone(),
            status,
            pid: process.pid(),
            exit_code,
            transcript,
            log,
            spawn_error: None,
            started_at,
            duration: clock.elapsed(),
        };

        info!(
            status = %report.status,
            exit_code = report.exit_code,
            lines = report.transcript.len(),
            duration_ms = report.duration.as_millis() as u64,
            "session finished"
        );
        self.sink.on_terminal(&report);
        report
    }

    /// Wait for whichever comes first: exit, cancel, or deadline.
    async fn supervise(
        &self,
        process: &mut ProcessHandle,
        guard: &TimeoutGuard,
    ) -> (RunStatus, Option<i32>) {
        let trigger = tokio::select! {
            biased;
            exited = process.wait() => Trigger::Exited(exited),
            () = self.cancel.cancelled() => Trigger::Cancel,
            () = guard.fired() => Trigger::Deadline,
        };

        match trigger {
            Trigger::Exited(Ok(status)) => (RunStatus::Completed, status.code()),
            Trigger::Exited(Err(err)) => {
                warn!(error = %err, "failed to collect exit status");
                (RunStatus::Completed, None)
            }
            Trigger::Cancel => {
                info!("cancellation requested; killing process");
                terminate(process, RunStatus::Cancelled).await
            }
            Trigger::Deadline => {
                warn!(
                    timeout_secs = guard.duration().as_secs_f64(),
                    "process timed out; killing"
                );
                terminate(process, RunStatus::TimedOut).await
            }
        }
    }

    async fn persist(&self, transcript: &Transcript, started_at: &DateTime<Local>) -> LogOutcome {
        let writer = TranscriptWriter::new(&self.settings.log_dir)
            .include_command(self.settings.include_command);

        match writer
            .persist(&self.command.command_line, transcript, started_at)
            .await
        {
            Ok(path) => {
                info!(path = %path.display(), "transcript saved");
                LogOutcome::Saved(path)
            }
            Err(err) => {
                warn!(error = %err, "transcript not saved");
                LogOutcome::Failed(err)
            }
        }
    }

    fn spawn_failed(
        &self,
        err: ExecLogError,
        started_at: DateTime<Local>,
        clock: Instant,
    ) -> SessionReport {
        warn!(error = %err, "command could not be started");
        self.advance(SessionState::SpawnFailed);
        self.sink.on_line(&format!("{ERROR_MARKER}{err}"), true);

        let report = SessionReport {
            command: self.command.command_line.clone(),
            status: RunStatus::SpawnFailed,
            pid: None,
            exit_code: None,
            transcript: Transcript::new(),
            log: LogOutcome::Skipped,
            spawn_error: Some(err),
            started_at,
            duration: clock.elapsed(),
        };
        self.sink.on_terminal(&report);
        report
    }

    fn advance(&self, target: SessionState) {
        self.state.send_modify(|state| {
            let from = *state;
            match state.transition_to(target) {
                Ok(()) => debug!(?from, to = ?target, "session state changed"),
                Err(err) => warn!(error = %err, "ignoring invalid session transition"),
            }
        });
    }
}

/// Kill the process and reap it.
///
/// If the process exited on its own in the meantime, the natural exit
/// wins and the run counts as completed.
async fn terminate(process: &mut ProcessHandle, status: RunStatus) -> (RunStatus, Option<i32>) {
    let killed = process.terminate();
    let exit_code = match process.wait().await {
        Ok(exit) => exit.code(),
        Err(err) => {
            warn!(error = %err, "failed to reap terminated process");
            None
        }
    };

    if killed {
        (status, exit_code)
    } else {
        debug!("process exited before termination took effect");
        (RunStatus::Completed, exit_code)
    }
}

/// Cancels a session. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
    state: watch::Receiver<SessionState>,
}

impl CancelHandle {
    /// Request cancellation.
    ///
    /// Only has an effect while the session is `Running`; otherwise it is a
    /// no-op. Returns whether the request was accepted.
    pub fn cancel(&self) -> bool {
        let state = *self.state.borrow();
        if state.is_running() {
            debug!("cancel requested");
            self.token.cancel();
            true
        } else {
            debug!(?state, "cancel ignored: session not running");
            false
        }
    }
}

/// A session running on a background task.
///
/// Dropping it before [`wait`](Self::wait) aborts the run, which kills the
/// child process.
pub struct RunningSession {
    cancel: CancelHandle,
    state: watch::Receiver<SessionState>,
    task: Option<JoinHandle<SessionReport>>,
}

impl RunningSession {
    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Wait until the session has left `Idle`/`Spawning`.
    ///
    /// Returns whether it is running at that point.
    pub async fn started(&mut self) -> bool {
        match self
            .state
            .wait_for(|s| !matches!(s, SessionState::Idle | SessionState::Spawning))
            .await
        {
            Ok(state) => state.is_running(),
            Err(_) => false,
        }
    }

    /// Wait for the final report.
    pub async fn wait(mut self) -> Result<SessionReport> {
        let task = self
            .task
            .take()
            .ok_or_else(|| ExecLogError::Task("session already awaited".into()))?;
        task.await.map_err(|e| ExecLogError::Task(e.to_string()))
    }
}

impl Drop for RunningSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

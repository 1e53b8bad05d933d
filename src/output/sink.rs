//! Live output sinks.

use std::io::Write;
use std::sync::Mutex;

use crate::execution::{LogOutcome, RunStatus, SessionReport};

/// Receives relayed lines as they arrive and the final report of a run.
///
/// Called from background tasks; implementations must not block for long.
pub trait OutputSink: Send + Sync {
    /// One line of output, error marker already applied.
    fn on_line(&self, text: &str, is_error: bool);

    /// The session reached its terminal status.
    fn on_terminal(&self, _report: &SessionReport) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn on_line(&self, _text: &str, _is_error: bool) {}
}

/// Prints lines to stdout and run notices to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn on_line(&self, text: &str, _is_error: bool) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }

    fn on_terminal(&self, report: &SessionReport) {
        for notice in notices(report) {
            eprintln!("{notice}");
        }
    }
}

/// Human-readable notices describing how a run ended.
pub fn notices(report: &SessionReport) -> Vec<String> {
    let mut lines = Vec::new();

    match report.status {
        RunStatus::TimedOut => lines.push(format!(
            "INFO: command terminated after exceeding the time limit ({:.1}s)",
            report.duration.as_secs_f64()
        )),
        RunStatus::Cancelled => lines.push("INFO: command was forcibly terminated".to_string()),
        RunStatus::Completed => {
            if let Some(code) = report.exit_code.filter(|code| *code != 0) {
                lines.push(format!("INFO: command exited with code {code}"));
            }
        }
        RunStatus::SpawnFailed | RunStatus::Running => {}
    }

    match &report.log {
        LogOutcome::Saved(path) => lines.push(format!("INFO: log saved: {}", path.display())),
        LogOutcome::Failed(err) => lines.push(format!("WARN: log not saved: {err}")),
        LogOutcome::Skipped => {}
    }

    lines
}

/// Keeps every line and terminal status in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    lines: Mutex<Vec<(String, bool)>>,
    terminal: Mutex<Vec<RunStatus>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines received so far, with their error flag.
    pub fn lines(&self) -> Vec<(String, bool)> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Statuses passed to `on_terminal`, in call order.
    pub fn terminal_statuses(&self) -> Vec<RunStatus> {
        self.terminal.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

impl OutputSink for CollectingSink {
    fn on_line(&self, text: &str, is_error: bool) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((text.to_string(), is_error));
        }
    }

    fn on_terminal(&self, report: &SessionReport) {
        if let Ok(mut terminal) = self.terminal.lock() {
            terminal.push(report.status);
        }
    }
}

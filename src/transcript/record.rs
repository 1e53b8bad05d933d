//! In-memory transcript of a run.

use std::fmt;

/// Prefix applied to every line that did not come from stdout.
pub const ERROR_MARKER: &str = "ERROR: ";

/// Where a transcript line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Standard output of the child.
    Stdout,
    /// Standard error of the child.
    Stderr,
    /// Diagnostic recorded by the relay itself (read failure, truncation).
    Relay,
}

impl Origin {
    /// Whether lines of this origin are shown with the error marker.
    pub fn is_error(&self) -> bool {
        !matches!(self, Origin::Stdout)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Origin::Stdout => "stdout",
            Origin::Stderr => "stderr",
            Origin::Relay => "relay",
        };
        f.write_str(name)
    }
}

/// A single captured line, without its line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub origin: Origin,
    pub text: String,
}

impl TranscriptLine {
    pub fn new(origin: Origin, text: impl Into<String>) -> Self {
        Self {
            origin,
            text: text.into(),
        }
    }

    pub fn stdout(text: impl Into<String>) -> Self {
        Self::new(Origin::Stdout, text)
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self::new(Origin::Stderr, text)
    }

    pub fn relay(text: impl Into<String>) -> Self {
        Self::new(Origin::Relay, text)
    }

    pub fn is_error(&self) -> bool {
        self.origin.is_error()
    }

    /// The line as it is displayed and persisted, marker included.
    pub fn display_text(&self) -> String {
        if self.is_error() {
            format!("{ERROR_MARKER}{}", self.text)
        } else {
            self.text.clone()
        }
    }
}

/// Ordered, origin-tagged record of everything a run printed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    lines: Vec<TranscriptLine>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: TranscriptLine) {
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[TranscriptLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines from a single origin, in recorded order.
    pub fn from_origin(&self, origin: Origin) -> impl Iterator<Item = &TranscriptLine> {
        self.lines.iter().filter(move |line| line.origin == origin)
    }

    /// Whether any line was recorded with the error marker.
    pub fn has_errors(&self) -> bool {
        self.lines.iter().any(TranscriptLine::is_error)
    }

    /// Render to the persisted form: one newline-terminated line per entry.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.display_text());
            out.push('\n');
        }
        out
    }
}

impl FromIterator<TranscriptLine> for Transcript {
    fn from_iter<I: IntoIterator<Item = TranscriptLine>>(iter: I) -> Self {
        Self {
            lines: iter.into_iter().collect(),
        }
    }
}

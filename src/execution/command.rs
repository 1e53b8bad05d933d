//! Resolved command representation.

use std::fmt;
use std::path::PathBuf;

/// A fully resolved command, ready to hand to the process launcher.
///
/// The command line is opaque: it is split on whitespace into a program
/// and its arguments, with no quoting, globbing, or shell involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// The command line to execute.
    pub command_line: String,
    /// Working directory override (if any).
    pub working_dir: Option<PathBuf>,
}

impl Command {
    /// Create a new command with the given command line.
    pub fn new(command_line: impl Into<String>) -> Self {
        Self {
            command_line: command_line.into(),
            working_dir: None,
        }
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Whitespace-separated tokens of the command line.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.command_line.split_whitespace()
    }

    /// The program to launch, if the command line has one.
    pub fn program(&self) -> Option<&str> {
        self.tokens().next()
    }

    /// Arguments following the program.
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.tokens().skip(1)
    }

    pub fn is_empty(&self) -> bool {
        self.program().is_none()
    }

    pub fn as_str(&self) -> &str {
        &self.command_line
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line)
    }
}

impl From<&str> for Command {
    fn from(command_line: &str) -> Self {
        Self::new(command_line)
    }
}

impl From<String> for Command {
    fn from(command_line: String) -> Self {
        Self::new(command_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_new() {
        let cmd = Command::new("ls -la");
        assert_eq!(cmd.command_line, "ls -la");
        assert!(cmd.working_dir.is_none());
    }

    #[test]
    fn test_tokens_collapse_whitespace() {
        let cmd = Command::new("  echo   hello \t world ");
        assert_eq!(cmd.program(), Some("echo"));
        let args: Vec<_> = cmd.args().collect();
        assert_eq!(args, vec!["hello", "world"]);
    }

    #[test]
    fn test_quotes_are_not_interpreted() {
        let cmd = Command::new("echo \"a b\"");
        let args: Vec<_> = cmd.args().collect();
        assert_eq!(args, vec!["\"a", "b\""]);
    }

    #[test]
    fn test_empty_command() {
        assert!(Command::new("").is_empty());
        assert!(Command::new("   ").is_empty());
        assert!(!Command::new("true").is_empty());
    }

    #[test]
    fn test_working_dir() {
        let cmd = Command::new("pwd").working_dir("/tmp");
        assert_eq!(cmd.working_dir, Some(PathBuf::from("/tmp")));
        assert_eq!(cmd.to_string(), "pwd");
    }
}

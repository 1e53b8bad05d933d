//! Building the final command line from user text and an imported executable.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::command::Command;
use crate::error::ExecLogError;
use crate::Result;

/// Combines raw user text with an optionally selected executable.
#[derive(Debug, Clone, Default)]
pub struct CommandResolver {
    executable: Option<PathBuf>,
}

impl CommandResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix resolved commands with `path`.
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    pub fn select_executable(&mut self, path: impl Into<PathBuf>) {
        self.executable = Some(path.into());
    }

    pub fn clear_executable(&mut self) {
        self.executable = None;
    }

    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }

    /// Resolve `raw` into a command.
    ///
    /// A selected executable that exists is prepended unless the first word
    /// of `raw` is already its path. A selected executable that has disappeared is
    /// ignored and `raw` runs as typed.
    pub fn resolve(&self, raw: &str) -> Result<Command> {
        let text = raw.trim();

        let prefix = match &self.executable {
            Some(path) if path.exists() => Some(absolute(path)),
            Some(path) => {
                warn!(
                    executable = %path.display(),
                    "selected executable no longer exists; running command as typed"
                );
                None
            }
            None => None,
        };

        let command_line = match prefix {
            Some(prefix) => {
                let prefix = prefix.to_string_lossy();
                if text.split_whitespace().next() == Some(prefix.as_ref()) {
                    text.to_string()
                } else if text.is_empty() {
                    prefix.into_owned()
                } else {
                    format!("{prefix} {text}")
                }
            }
            None => text.to_string(),
        };

        if command_line.is_empty() {
            return Err(ExecLogError::EmptyCommand);
        }

        debug!(command = %command_line, "command resolved");
        Ok(Command::new(command_line))
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Copy `source` into `dir` under its own file name and make it executable.
///
/// `dir` is created if needed. Returns the path of the copy.
pub fn import_executable(source: &Path, dir: &Path) -> Result<PathBuf> {
    let import_err = |source_err: std::io::Error| ExecLogError::Import {
        path: source.to_path_buf(),
        source: source_err,
    };

    let file_name = source.file_name().ok_or_else(|| {
        import_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "path has no file name",
        ))
    })?;

    std::fs::create_dir_all(dir).map_err(import_err)?;

    let dest = dir.join(file_name);
    std::fs::copy(source, &dest).map_err(import_err)?;
    mark_executable(&dest).map_err(import_err)?;

    debug!(from = %source.display(), to = %dest.display(), "executable imported");
    Ok(dest)
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

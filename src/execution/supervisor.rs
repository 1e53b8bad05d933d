//! Child process spawning and termination.

use std::io::ErrorKind;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdout};
use tracing::{debug, warn};

use super::command::Command;
use crate::error::ExecLogError;
use crate::Result;

/// Launches commands as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSupervisor;

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self
    }

    /// Spawn `command` with piped stdout/stderr and a null stdin.
    ///
    /// On Unix the child leads a new process group, so killing it also
    /// reaches anything it started. Fails synchronously when the command is empty or the program cannot
    /// be launched.
    pub fn spawn(&self, command: &Command) -> Result<ProcessHandle> {
        let program = command.program().ok_or(ExecLogError::EmptyCommand)?;

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = command.working_dir {
            cmd.current_dir(dir);
        }

        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|source| ExecLogError::Spawn {
            command: command.command_line.clone(),
            source,
        })?;

        let pid = child.id();
        debug!(pid, command = %command, "process spawned");

        Ok(ProcessHandle { child, pid })
    }
}

/// Handle to one spawned child process.
///
/// Dropping the handle kills the child, and on Unix its process group, if
/// it is still running.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    pid: Option<u32>,
}

impl ProcessHandle {
    /// OS process id, captured at spawn time.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Take the stdout pipe. Returns `None` after the first call.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take the stderr pipe. Returns `None` after the first call.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Whether the child has not exited yet.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Forcibly kill the child and its descendants.
    ///
    /// Idempotent: on a process that already exited this does nothing.
    /// Returns whether a kill was actually delivered.
    pub fn terminate(&mut self) -> bool {
        if !self.is_alive() {
            debug!(pid = self.pid, "terminate: process already exited");
            return false;
        }

        match self.send_kill() {
            Ok(()) => {
                debug!(pid = self.pid, "kill signal sent");
                true
            }
            // Lost the race against a natural exit.
            Err(e) if e.kind() == ErrorKind::InvalidInput => {
                debug!(pid = self.pid, "terminate: process exited before kill");
                false
            }
            Err(e) => {
                warn!(pid = self.pid, error = %e, "failed to kill process");
                false
            }
        }
    }

    /// Wait for the child to exit and reap it.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    fn send_kill(&mut self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            if let Some(pid) = self.pid {
                match kill_process_group(pid) {
                    Ok(()) => return Ok(()),
                    Err(e) => debug!(pid, error = %e, "group kill failed; killing child only"),
                }
            }
        }
        self.child.start_kill()
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if self.is_alive() {
            let _ = self.send_kill();
        }
    }
}

/// SIGKILL every process in the group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: u32) -> std::io::Result<()> {
    let pgid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::from(ErrorKind::InvalidInput))?;

    // SAFETY: killpg takes plain integers and touches no memory of ours.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

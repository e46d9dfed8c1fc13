//! Process execution
//!
//! `CommandExecutor` is the seam between orchestration code and the operating
//! system: one-shot commands (`run`), long-running node processes (`start`)
//! and their termination (`stop`, `kill`).

use async_trait::async_trait;
use devnet_errors::{Error, PlatformError};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Platform-specific command builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    log_file: Option<PathBuf>,
}

impl PlatformCommand {
    /// Create a new platform command
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env: BTreeMap::new(),
            log_file: None,
        }
    }

    /// Add an argument to the command
    #[must_use]
    pub fn arg<S: AsRef<str>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Add multiple arguments to the command
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    /// Set the working directory for the command
    #[must_use]
    pub fn current_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Append stdout and stderr of a started process to this file
    #[must_use]
    pub fn log_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Get the program name
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Get the arguments
    #[must_use]
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Render the command line for logs and error messages
    #[must_use]
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    fn to_tokio(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }
        command
    }
}

/// Output from command execution
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.status.success()
    }

    #[must_use]
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }

    #[must_use]
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }

    /// Turn a non-zero exit into `CommandFailed`
    ///
    /// # Errors
    ///
    /// Returns an error carrying stderr when the command did not succeed.
    pub fn into_success(self, command: &PlatformCommand) -> Result<Self, Error> {
        if self.success() {
            Ok(self)
        } else {
            Err(PlatformError::CommandFailed {
                command: command.display(),
                code: self.status.code(),
                stderr: self.stderr_str(),
            }
            .into())
        }
    }
}

/// A process started by `CommandExecutor::start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    pub pid: u32,
    pub name: String,
}

/// Trait for process execution operations
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run a command to completion and capture its output
    async fn run(&self, cmd: &PlatformCommand) -> Result<CommandOutput, Error>;

    /// Start a long-running process in the background
    async fn start(&self, name: &str, cmd: &PlatformCommand) -> Result<ProcessHandle, Error>;

    /// Ask a process to terminate, killing it once `grace` has elapsed
    async fn stop(&self, handle: &ProcessHandle, grace: Duration) -> Result<(), Error>;

    /// Terminate a process immediately
    async fn kill(&self, handle: &ProcessHandle) -> Result<(), Error>;

    /// Whether the process is still alive
    async fn is_running(&self, handle: &ProcessHandle) -> bool;
}

/// `CommandExecutor` backed by `tokio::process`
///
/// Signals are delivered through the system `kill` utility.
#[derive(Debug, Clone)]
pub struct TokioCommandExecutor {
    poll_interval: Duration,
}

impl TokioCommandExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
        }
    }

    async fn signal(&self, pid: u32, signal: &str) -> Result<bool, Error> {
        let cmd = PlatformCommand::new("kill")
            .arg(format!("-{signal}"))
            .arg(pid.to_string());
        let output = self.run(&cmd).await?;
        Ok(output.success())
    }
}

impl Default for TokioCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandExecutor for TokioCommandExecutor {
    async fn run(&self, cmd: &PlatformCommand) -> Result<CommandOutput, Error> {
        let mut command = cmd.to_tokio();
        // Dropping the future (e.g. on timeout) must not leave the child behind
        command.kill_on_drop(true);
        command.stdin(Stdio::null());

        let output = command
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => PlatformError::CommandNotFound {
                    command: cmd.program().to_string(),
                },
                _ => PlatformError::ProcessExecutionFailed {
                    command: cmd.display(),
                    message: e.to_string(),
                },
            })?;

        Ok(CommandOutput {
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    async fn start(&self, name: &str, cmd: &PlatformCommand) -> Result<ProcessHandle, Error> {
        let mut command = cmd.to_tokio();
        command.stdin(Stdio::null());

        match &cmd.log_file {
            Some(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| Error::io_with_path(&e, path))?;
                let err_file = file.try_clone().map_err(|e| Error::io_with_path(&e, path))?;
                command.stdout(Stdio::from(file));
                command.stderr(Stdio::from(err_file));
            }
            None => {
                command.stdout(Stdio::null());
                command.stderr(Stdio::null());
            }
        }

        let mut child = command
            .spawn()
            .map_err(|e| PlatformError::ProcessExecutionFailed {
                command: cmd.display(),
                message: e.to_string(),
            })?;
        let pid = child.id().ok_or_else(|| PlatformError::ProcessExecutionFailed {
            command: cmd.display(),
            message: "process exited before its pid could be read".to_string(),
        })?;

        // Reap the child when it exits so it does not linger as a zombie
        tokio::spawn(async move {
            let _ = child.wait().await;
        });

        Ok(ProcessHandle {
            pid,
            name: name.to_string(),
        })
    }

    async fn stop(&self, handle: &ProcessHandle, grace: Duration) -> Result<(), Error> {
        if !self.is_running(handle).await {
            return Ok(());
        }
        self.signal(handle.pid, "TERM").await?;

        let deadline = tokio::time::Instant::now() + grace;
        while tokio::time::Instant::now() < deadline {
            if !self.is_running(handle).await {
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        tracing::warn!(
            pid = handle.pid,
            name = %handle.name,
            grace_secs = grace.as_secs(),
            "process ignored SIGTERM, killing"
        );
        self.kill(handle).await?;

        for _ in 0..10 {
            if !self.is_running(handle).await {
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        Err(PlatformError::StopTimeout {
            pid: handle.pid,
            seconds: grace.as_secs(),
        }
        .into())
    }

    async fn kill(&self, handle: &ProcessHandle) -> Result<(), Error> {
        if self.signal(handle.pid, "KILL").await? || !self.is_running(handle).await {
            Ok(())
        } else {
            Err(PlatformError::ProcessExecutionFailed {
                command: format!("kill -KILL {}", handle.pid),
                message: "signal was not delivered".to_string(),
            }
            .into())
        }
    }

    async fn is_running(&self, handle: &ProcessHandle) -> bool {
        self.signal(handle.pid, "0").await.unwrap_or(false)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_captures_output() {
        let exec = TokioCommandExecutor::new();
        let cmd = PlatformCommand::new("sh").args(["-c", "echo v0.50.1; echo oops >&2; exit 3"]);
        let output = exec.run(&cmd).await.unwrap();
        assert_eq!(output.stdout_str(), "v0.50.1");
        assert_eq!(output.stderr_str(), "oops");
        assert_eq!(output.status.code(), Some(3));

        let err = output.into_success(&cmd).unwrap_err();
        assert!(matches!(
            err,
            Error::Platform(PlatformError::CommandFailed { code: Some(3), .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let exec = TokioCommandExecutor::new();
        let err = exec
            .run(&PlatformCommand::new("definitely-not-a-real-binary-name"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Platform(PlatformError::CommandNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let exec = TokioCommandExecutor::new();
        let handle = exec
            .start("sleeper", &PlatformCommand::new("sleep").arg("30"))
            .await
            .unwrap();
        assert!(exec.is_running(&handle).await);

        exec.stop(&handle, Duration::from_secs(5)).await.unwrap();
        assert!(!exec.is_running(&handle).await);
    }
}

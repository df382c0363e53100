use std::{
    collections::HashMap,
    fmt,
    fs::File,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Mutex,
};

use async_trait::async_trait;
use log::debug;
use tokio::process::Command;

use crate::error::SiteError;

/// External command to run through an [`Executor`].
///
/// `privileged` marks commands that need root. Whether that turns into a
/// `sudo` prefix is decided by the executor, not by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
    pub privileged: bool,
    pub stream: bool,
    pub cwd: Option<PathBuf>,
    pub stdin: Option<PathBuf>,
    pub stdout: Option<PathBuf>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            privileged: false,
            stream: false,
            cwd: None,
            stdin: None,
            stdout: None,
        }
    }

    /// Shorthand for a privileged command with arguments.
    pub fn root<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(program).args(args).privileged()
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    /// Forward stdout/stderr to the terminal instead of capturing them.
    pub fn streamed(mut self) -> Self {
        self.stream = true;
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn stdin_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    pub fn stdout_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    /// Combined stdout and stderr. Empty for streamed commands.
    pub output: String,
}

impl CommandOutput {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            output: output.into(),
        }
    }

    pub fn failed(code: i32, output: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            output: output.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs the command to completion. A non-zero exit is not an error here,
    /// only a failure to start the process is.
    async fn run(&self, cmd: &ShellCommand) -> Result<CommandOutput, SiteError>;

    /// Like [`Executor::run`], but a non-zero exit becomes [`SiteError::CommandFailed`].
    async fn run_checked(&self, cmd: &ShellCommand) -> Result<CommandOutput, SiteError> {
        let out = self.run(cmd).await?;
        if out.success() {
            return Ok(out);
        }

        let detail = out.output.trim();
        let output = if detail.is_empty() {
            match out.code {
                Some(code) => format!("exit status {}", code),
                None => "terminated by signal".to_string(),
            }
        } else {
            detail.to_string()
        };

        Err(SiteError::CommandFailed {
            command: cmd.to_string(),
            output,
        })
    }

    /// Captured output of a command whose exit status does not matter.
    async fn capture(&self, cmd: &ShellCommand) -> String {
        match self.run(cmd).await {
            Ok(out) => out.output,
            Err(e) => {
                debug!("{}", e);
                String::new()
            }
        }
    }
}

/// Checks whether the process runs with an effective uid of 0.
pub fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Runs commands on the local host via `tokio::process`.
pub struct SystemExecutor {
    sudo: bool,
}

impl SystemExecutor {
    pub fn new(use_sudo: bool) -> Self {
        Self {
            sudo: use_sudo && !is_root(),
        }
    }

    fn build(&self, cmd: &ShellCommand) -> Result<Command, SiteError> {
        let mut command = if cmd.privileged && self.sudo {
            let mut c = Command::new("sudo");
            c.arg(&cmd.program);
            c
        } else {
            Command::new(&cmd.program)
        };
        command.args(&cmd.args);

        if let Some(dir) = &cmd.cwd {
            command.current_dir(dir);
        }
        if let Some(path) = &cmd.stdin {
            command.stdin(open_for_read(path)?);
        }
        if let Some(path) = &cmd.stdout {
            let file = File::create(path).map_err(|e| SiteError::io(path, e))?;
            command.stdout(Stdio::from(file));
        }

        Ok(command)
    }
}

fn open_for_read(path: &Path) -> Result<Stdio, SiteError> {
    let file = File::open(path).map_err(|e| SiteError::io(path, e))?;
    Ok(Stdio::from(file))
}

#[async_trait]
impl Executor for SystemExecutor {
    async fn run(&self, cmd: &ShellCommand) -> Result<CommandOutput, SiteError> {
        debug!("Running: {}{}", if cmd.privileged && self.sudo { "sudo " } else { "" }, cmd);

        let mut command = self.build(cmd)?;
        let spawn_err = |source| SiteError::Spawn {
            command: cmd.to_string(),
            source,
        };

        if cmd.stream {
            if cmd.stdout.is_none() {
                command.stdout(Stdio::inherit());
            }
            command.stderr(Stdio::inherit());
            let status = command.status().await.map_err(spawn_err)?;
            return Ok(CommandOutput {
                code: status.code(),
                output: String::new(),
            });
        }

        let output = command.output().await.map_err(spawn_err)?;
        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            code: output.status.code(),
            output: text,
        })
    }
}

/// Executor that never spawns anything. It records every command and
/// answers with scripted outputs keyed by program name (success with empty
/// output by default).
#[derive(Default)]
pub struct RecordingExecutor {
    commands: Mutex<Vec<ShellCommand>>,
    responses: Mutex<HashMap<String, CommandOutput>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, program: &str, output: CommandOutput) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(program.to_string(), output);
        }
    }

    pub fn commands(&self) -> Vec<ShellCommand> {
        self.commands
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Recorded command lines, rendered as strings.
    pub fn lines(&self) -> Vec<String> {
        self.commands().iter().map(ToString::to_string).collect()
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn run(&self, cmd: &ShellCommand) -> Result<CommandOutput, SiteError> {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(cmd.clone());
        }
        let scripted = self
            .responses
            .lock()
            .ok()
            .and_then(|r| r.get(&cmd.program).cloned());
        Ok(scripted.unwrap_or_else(|| CommandOutput::ok("")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_program_and_args() {
        let cmd = ShellCommand::root("systemctl", ["reload", "nginx"]);
        assert_eq!(cmd.to_string(), "systemctl reload nginx");
        assert!(cmd.privileged);
        assert!(!cmd.stream);
    }

    #[tokio::test]
    async fn run_checked_reports_output_of_failed_command() {
        let exec = RecordingExecutor::new();
        exec.respond("certbot", CommandOutput::failed(1, "rate limited\n"));

        let err = exec
            .run_checked(&ShellCommand::new("certbot").arg("renew"))
            .await
            .unwrap_err();

        match err {
            SiteError::CommandFailed { command, output } => {
                assert_eq!(command, "certbot renew");
                assert_eq!(output, "rate limited");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn run_checked_falls_back_to_exit_code() {
        let exec = RecordingExecutor::new();
        exec.respond("ufw", CommandOutput::failed(3, ""));

        let err = exec.run_checked(&ShellCommand::new("ufw")).await.unwrap_err();
        assert!(err.to_string().ends_with("exit status 3"));
    }

    #[tokio::test]
    async fn recording_executor_keeps_order() {
        let exec = RecordingExecutor::new();
        exec.run(&ShellCommand::new("a")).await.unwrap();
        exec.run(&ShellCommand::new("b").arg("x")).await.unwrap();
        assert_eq!(exec.lines(), vec!["a", "b x"]);
    }
}

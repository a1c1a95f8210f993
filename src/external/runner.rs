use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// What to execute: a binary with an argument vector, or a shell script for pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Argv { program: String, args: Vec<String> },
    Shell(String),
}

/// A single external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub kind: CommandKind,
    pub stdin: Option<String>,
    pub timeout: Option<Duration>,
    /// Append stderr lines after stdout (for banners and `-h` output printed on stderr).
    pub capture_stderr: bool,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self::from_kind(CommandKind::Argv { program: program.into(), args: Vec::new() })
    }

    pub fn shell(script: impl Into<String>) -> Self {
        Self::from_kind(CommandKind::Shell(script.into()))
    }

    fn from_kind(kind: CommandKind) -> Self {
        Self { kind, stdin: None, timeout: None, capture_stderr: false }
    }

    /// Append one argument. No-op for shell commands.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        if let CommandKind::Argv { args, .. } = &mut self.kind {
            args.push(arg.into());
        }
        self
    }

    pub fn args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        args.into_iter().fold(self, |cmd, a| cmd.arg(a))
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn with_stderr(mut self) -> Self {
        self.capture_stderr = true;
        self
    }

    /// Program name; for shell scripts this is the first word of the script.
    pub fn program(&self) -> &str {
        match &self.kind {
            CommandKind::Argv { program, .. } => program,
            CommandKind::Shell(script) => script.split_whitespace().next().unwrap_or_default(),
        }
    }

    /// Basename of the program, so `/root/go/bin/httpx` and `httpx` compare equal.
    pub fn tool_name(&self) -> &str {
        let program = self.program();
        program.rsplit('/').next().unwrap_or(program)
    }

    pub fn argv(&self) -> &[String] {
        match &self.kind {
            CommandKind::Argv { args, .. } => args,
            CommandKind::Shell(_) => &[],
        }
    }

    pub fn has_arg(&self, flag: &str) -> bool {
        self.argv().iter().any(|a| a == flag)
    }

    /// Value following `flag` in the argument vector, if any.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        let args = self.argv();
        args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).map(String::as_str)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            CommandKind::Argv { program, args } => {
                write!(f, "{program}")?;
                for a in args {
                    write!(f, " {a}")?;
                }
                Ok(())
            }
            CommandKind::Shell(script) => write!(f, "{script}"),
        }
    }
}

/// Executes external tools and hands back their stdout as lines.
///
/// Implementations never fail: a tool that cannot start, times out or exits
/// non-zero simply yields whatever it printed (often nothing).
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, cmd: &ToolCommand) -> Vec<String>;
}

/// Runs commands as real child processes through `tokio::process`.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    shell: String,
    envs: Vec<(String, String)>,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemRunner {
    pub fn new() -> Self {
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string());
        Self { shell, envs: Vec::new() }
    }

    /// Route every child process through `proxy` via the conventional environment variables.
    pub fn with_proxy(mut self, proxy: &str) -> Self {
        for key in ["HTTP_PROXY", "HTTPS_PROXY", "http_proxy", "https_proxy"] {
            self.envs.push((key.to_string(), proxy.to_string()));
        }
        self
    }

    fn build(&self, cmd: &ToolCommand) -> Command {
        let mut command = match &cmd.kind {
            CommandKind::Argv { program, args } => {
                let mut c = Command::new(program);
                c.args(args);
                c
            }
            CommandKind::Shell(script) => {
                let mut c = Command::new(&self.shell);
                c.arg("-c").arg(script);
                c
            }
        };
        command
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if cmd.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn execute(&self, cmd: &ToolCommand) -> Result<std::process::Output> {
        let mut child = self.build(cmd).spawn().with_context(|| format!("failed to spawn `{}`", cmd.program()))?;

        if let (Some(input), Some(mut stdin)) = (cmd.stdin.clone(), child.stdin.take()) {
            // Feed stdin concurrently so a chatty child cannot deadlock on a full stdout pipe.
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    tracing::debug!(error = %e, "failed to write child stdin");
                }
            });
        }

        let output = child.wait_with_output();
        match cmd.timeout {
            Some(limit) => tokio::time::timeout(limit, output)
                .await
                .with_context(|| format!("`{}` timed out after {}s", cmd.program(), limit.as_secs()))?
                .context("failed to collect output"),
            None => output.await.context("failed to collect output"),
        }
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, cmd: &ToolCommand) -> Vec<String> {
        tracing::debug!(command = %cmd, "running external tool");
        match self.execute(cmd).await {
            Ok(output) => {
                if !output.status.success() {
                    tracing::warn!(tool = cmd.tool_name(), status = %output.status, "tool exited non-zero; using whatever it printed");
                }
                let mut lines: Vec<String> = String::from_utf8_lossy(&output.stdout).lines().map(str::to_string).collect();
                if cmd.capture_stderr {
                    lines.extend(String::from_utf8_lossy(&output.stderr).lines().map(str::to_string));
                }
                lines
            }
            Err(e) => {
                tracing::warn!(tool = cmd.tool_name(), error = %e, "tool invocation failed; treating as empty output");
                Vec::new()
            }
        }
    }
}

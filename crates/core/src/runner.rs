// crates/core/src/runner.rs
//! Subprocess stream bridge: spawns the agent CLI for one turn and feeds its
//! stream-json output into the session line by line.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::envelope::{parse_line, ExecutionEvent};
use crate::error::TurnError;
use crate::turn::{TurnOutcome, TurnRecorder};

/// Arguments that put the agent CLI into headless stream-json mode.
pub const CLAUDE_BASE_ARGS: &[&str] = &[
    "--print",
    "--output-format",
    "stream-json",
    "--verbose",
    "--dangerously-skip-permissions",
];

/// Env vars that make a child `claude` believe it is nested in another session.
const NESTING_ENV_VARS: &[&str] = &["CLAUDECODE", "CLAUDE_CODE_SSE_PORT", "CLAUDE_CODE_ENTRYPOINT"];

/// Default wall-clock limit for one turn.
pub const DEFAULT_TURN_TIMEOUT_SECS: u64 = 30 * 60;

const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Stderr characters written to the log when a turn fails.
const STDERR_LOG_CHARS: usize = 500;

/// Receives each decoded event as soon as its line is read.
///
/// Implementations must not block: they run between two reads of the child's
/// stdout.
pub trait EventSink: Send + Sync {
    fn apply(&self, event: &ExecutionEvent);
}

/// What to run for a turn.
#[derive(Debug, Clone)]
pub struct AgentCommand {
    program: String,
    base_args: Vec<String>,
    timeout: Option<Duration>,
    stripped_env: Vec<String>,
}

impl AgentCommand {
    /// The `claude` CLI in headless stream-json mode.
    ///
    /// Only the nesting markers are removed from the child's environment;
    /// config and credential vars such as `CLAUDE_CONFIG_DIR` pass through.
    pub fn claude(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            base_args: CLAUDE_BASE_ARGS.iter().map(|s| s.to_string()).collect(),
            timeout: Some(Duration::from_secs(DEFAULT_TURN_TIMEOUT_SECS)),
            stripped_env: NESTING_ENV_VARS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// An arbitrary program with fixed leading arguments and no timeout.
    pub fn new<I, S>(program: impl Into<String>, base_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            base_args: base_args.into_iter().map(Into::into).collect(),
            timeout: None,
            stripped_env: Vec::new(),
        }
    }

    /// `None` waits for the child indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Full argument list for one launch.
    pub fn args_for(&self, launch: &LaunchConfig) -> Vec<String> {
        let mut args = self.base_args.clone();
        if let Some(model) = &launch.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        if launch.continue_session {
            args.push("--continue".to_string());
        }
        args
    }

    /// `<program> --version`, trimmed, when the program runs and exits 0.
    pub async fn version(&self) -> Option<String> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true);
        for var in &self.stripped_env {
            cmd.env_remove(var);
        }

        match tokio::time::timeout(VERSION_CHECK_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            }
            Ok(Ok(output)) => {
                tracing::warn!(program = %self.program, exit_code = ?output.status.code(), "agent version check failed");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(program = %self.program, error = %e, "agent CLI not available");
                None
            }
            Err(_) => {
                tracing::warn!(program = %self.program, "agent version check timed out");
                None
            }
        }
    }

    pub async fn check_available(&self) -> bool {
        self.version().await.is_some()
    }
}

/// Per-turn launch parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub prompt: String,
    pub model: Option<String>,
    /// Resume the agent's previous conversation instead of starting fresh.
    pub continue_session: bool,
}

/// Runs turns with a fixed [`AgentCommand`].
#[derive(Debug, Clone)]
pub struct TurnRunner {
    command: AgentCommand,
}

impl TurnRunner {
    pub fn new(command: AgentCommand) -> Self {
        Self { command }
    }

    pub fn command(&self) -> &AgentCommand {
        &self.command
    }

    /// Run one turn to completion.
    ///
    /// Every event is handed to `sink` before the next stdout line is read.
    /// Events applied before a failure stay applied.
    pub async fn stream_turn(
        &self,
        launch: &LaunchConfig,
        sink: &dyn EventSink,
    ) -> Result<TurnOutcome, TurnError> {
        let t0 = Instant::now();
        let args = self.command.args_for(launch);

        tracing::info!(
            program = %self.command.program,
            model = ?launch.model,
            continue_session = launch.continue_session,
            prompt_chars = launch.prompt.chars().count(),
            "agent turn: spawning"
        );

        let mut cmd = Command::new(&self.command.program);
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for var in &self.command.stripped_env {
            cmd.env_remove(var);
        }

        let mut child = cmd.spawn().map_err(|source| {
            tracing::error!(program = %self.command.program, error = %source, "agent turn: failed to spawn");
            TurnError::LaunchFailed {
                program: self.command.program.clone(),
                source,
            }
        })?;

        let mut stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let mut stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        // A child that exits without reading its prompt is reported by its
        // exit status, not by the broken pipe.
        if let Err(e) = stdin.write_all(launch.prompt.as_bytes()).await {
            tracing::warn!(error = %e, "agent turn: failed to write prompt");
        }
        drop(stdin);

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Err(e) = stderr.read_to_end(&mut buf).await {
                tracing::warn!(error = %e, "agent turn: failed to read stderr");
            }
            String::from_utf8_lossy(&buf).into_owned()
        });

        let mut recorder = TurnRecorder::new();
        let drive = async {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                if reader.read_until(b'\n', &mut buf).await? == 0 {
                    break;
                }
                let line = String::from_utf8_lossy(&buf);
                match parse_line(&line) {
                    Ok(events) => {
                        for event in &events {
                            sink.apply(event);
                            recorder.record(event);
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "agent turn: skipping malformed line"),
                }
            }
            child.wait().await
        };

        let waited = match self.command.timeout {
            Some(limit) => tokio::time::timeout(limit, drive).await.ok(),
            None => Some(drive.await),
        };

        let status = match waited {
            Some(status) => status?,
            None => {
                let secs = self.command.timeout.map(|d| d.as_secs()).unwrap_or_default();
                tracing::error!(elapsed_ms = t0.elapsed().as_millis() as u64, timeout_secs = secs, "agent turn: timed out");
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "agent turn: failed to kill timed-out child");
                }
                stderr_task.abort();
                return Err(TurnError::Timeout(secs));
            }
        };

        let stderr = stderr_task.await.unwrap_or_default();
        let elapsed_ms = t0.elapsed().as_millis() as u64;

        if !status.success() {
            let excerpt: String = stderr.chars().take(STDERR_LOG_CHARS).collect();
            tracing::error!(elapsed_ms, exit_code = ?status.code(), stderr = %excerpt, "agent turn: non-zero exit");
            return Err(TurnError::exit_non_zero(status.code(), &stderr));
        }

        if !recorder.has_response() {
            tracing::error!(elapsed_ms, "agent turn: empty response");
            return Err(TurnError::EmptyResponse);
        }

        let outcome = recorder.finish();
        tracing::info!(
            elapsed_ms,
            cost_usd = ?outcome.metadata.cost_usd,
            tools = outcome.metadata.tool_count,
            context_tokens = outcome.metadata.context_tokens(),
            context_window = outcome.metadata.context_window,
            "agent turn: completed"
        );
        Ok(outcome)
    }
}

fn missing_pipe(name: &str) -> TurnError {
    TurnError::Io(std::io::Error::other(format!("failed to capture child {name}")))
}

//! Encoder process lifecycle.

use std::fmt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use keyreel_common::error::ReelResult;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::job::EncodeJob;
use crate::locate::EncoderLocator;

/// How long to wait for stderr to drain after the process exits.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Ways the encoder process can fail without producing an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaunchFailureKind {
    FailedToStart,
    Crashed,
    TimedOut,
}

impl fmt::Display for LaunchFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::FailedToStart => "Failed to start FFmpeg process",
            Self::Crashed => "FFmpeg process crashed",
            Self::TimedOut => "FFmpeg process timed out",
        };
        f.write_str(text)
    }
}

/// The encoder could not be started or did not run to an exit code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {reason}")]
pub struct LaunchError {
    pub kind: LaunchFailureKind,
    pub reason: String,
}

impl LaunchError {
    pub fn new(kind: LaunchFailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

/// Outcome of one encoder run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeResult {
    Success { output_path: PathBuf },
    Failure { exit_code: i32, diagnostics: String },
    LaunchFailure { kind: LaunchFailureKind, reason: String },
}

impl EncodeResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Display-ready description of the outcome.
    pub fn message(&self) -> String {
        match self {
            Self::Success { output_path } => {
                format!("Animation exported to: {}", output_path.display())
            }
            Self::Failure {
                exit_code,
                diagnostics,
            } => format!(
                "FFmpeg failed with exit code {exit_code}\n{}",
                diagnostics.trim_end()
            ),
            Self::LaunchFailure { kind, .. } => kind.to_string(),
        }
    }
}

impl From<LaunchError> for EncodeResult {
    fn from(err: LaunchError) -> Self {
        Self::LaunchFailure {
            kind: err.kind,
            reason: err.reason,
        }
    }
}

/// Discovers the encoder and runs encode jobs.
#[derive(Debug, Clone)]
pub struct EncoderProcessManager {
    locator: EncoderLocator,
    timeout: Option<Duration>,
}

impl EncoderProcessManager {
    pub fn new(locator: EncoderLocator) -> Self {
        Self {
            locator,
            timeout: None,
        }
    }

    /// Limit the total run time of each encode.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn locate(&self) -> ReelResult<PathBuf> {
        self.locator.locate()
    }

    pub fn is_available(&self) -> bool {
        self.locator.is_available()
    }

    /// Spawn the encoder for `job`.
    ///
    /// Creates the output file's parent directory first. Stdin is closed and
    /// stderr is drained in the background.
    pub fn start(&self, job: &EncodeJob) -> Result<EncodeProcess, LaunchError> {
        if let Some(parent) = job.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LaunchError::new(
                        LaunchFailureKind::FailedToStart,
                        format!(
                            "Failed to create output directory {}: {e}",
                            parent.display()
                        ),
                    )
                })?;
            }
        }

        tracing::debug!(command = %job.command_line(), "Starting encoder");

        let mut child = Command::new(&job.encoder)
            .args(job.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                LaunchError::new(
                    LaunchFailureKind::FailedToStart,
                    format!("Failed to spawn {}: {e}", job.encoder.display()),
                )
            })?;

        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                if let Err(e) = stderr.read_to_end(&mut buf).await {
                    tracing::debug!(error = %e, "Encoder stderr read failed");
                }
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        tracing::info!(
            pid = child.id(),
            frame_rate = job.frame_rate,
            output = %job.output_path.display(),
            "Encoder process started"
        );

        Ok(EncodeProcess {
            child,
            output_path: job.output_path.clone(),
            stderr_task,
            deadline: self.timeout.map(|limit| Instant::now() + limit),
        })
    }

    /// Start `job` and wait for it to finish.
    pub async fn run(&self, job: &EncodeJob) -> EncodeResult {
        match self.start(job) {
            Ok(mut process) => process.wait().await,
            Err(err) => err.into(),
        }
    }
}

/// A running encoder.
///
/// Dropping the handle kills the process.
#[derive(Debug)]
pub struct EncodeProcess {
    child: Child,
    output_path: PathBuf,
    stderr_task: Option<JoinHandle<String>>,
    deadline: Option<Instant>,
}

impl EncodeProcess {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Whether the process has already exited, without waiting.
    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Wait for the encoder to exit. Cancel safe.
    pub async fn wait(&mut self) -> EncodeResult {
        let status = match self.deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, self.child.wait()).await {
                    Ok(status) => status,
                    Err(_) => {
                        tracing::warn!("Encoder timed out, killing process");
                        if let Err(e) = self.child.kill().await {
                            tracing::warn!(error = %e, "Failed to kill encoder");
                        }
                        self.abort_stderr();
                        return LaunchError::new(
                            LaunchFailureKind::TimedOut,
                            "Encoder exceeded its time limit",
                        )
                        .into();
                    }
                }
            }
            None => self.child.wait().await,
        };

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                self.abort_stderr();
                return LaunchError::new(
                    LaunchFailureKind::Crashed,
                    format!("Failed to wait on encoder: {e}"),
                )
                .into();
            }
        };

        let diagnostics = self.collect_stderr().await;
        self.classify(status, diagnostics)
    }

    /// Ask the encoder to stop, then kill it if it is still running after
    /// `grace`.
    pub async fn terminate(&mut self, grace: Duration) {
        if let Ok(Some(_)) = self.child.try_wait() {
            self.abort_stderr();
            return;
        }

        self.signal_terminate();

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(_) => tracing::debug!("Encoder stopped"),
            Err(_) => {
                tracing::warn!(
                    grace_ms = grace.as_millis() as u64,
                    "Encoder ignored terminate, killing"
                );
                if let Err(e) = self.child.kill().await {
                    tracing::warn!(error = %e, "Failed to kill encoder");
                }
            }
        }

        self.abort_stderr();
    }

    #[cfg(unix)]
    fn signal_terminate(&mut self) {
        if let Some(pid) = self.child.id() {
            // SAFETY: plain syscall on a pid we spawned and have not reaped.
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if rc != 0 {
                tracing::debug!(pid, "SIGTERM delivery failed");
            }
        }
    }

    #[cfg(not(unix))]
    fn signal_terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "Failed to signal encoder");
        }
    }

    fn classify(&self, status: ExitStatus, diagnostics: String) -> EncodeResult {
        if status.success() {
            tracing::info!(output = %self.output_path.display(), "Encoder finished");
            return EncodeResult::Success {
                output_path: self.output_path.clone(),
            };
        }

        match status.code() {
            Some(exit_code) => {
                tracing::warn!(exit_code, stderr = %diagnostics.trim_end(), "Encoder failed");
                EncodeResult::Failure {
                    exit_code,
                    diagnostics,
                }
            }
            None => {
                tracing::warn!(%status, "Encoder terminated without exit code");
                LaunchError::new(
                    LaunchFailureKind::Crashed,
                    format!("Encoder terminated abnormally ({status})"),
                )
                .into()
            }
        }
    }

    async fn collect_stderr(&mut self) -> String {
        let Some(task) = self.stderr_task.take() else {
            return String::new();
        };
        match tokio::time::timeout(STDERR_DRAIN_TIMEOUT, task).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => format!("<failed to read encoder stderr: {e}>"),
            Err(_) => String::new(),
        }
    }

    fn abort_stderr(&mut self) {
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}

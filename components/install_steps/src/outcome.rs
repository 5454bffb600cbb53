// components/install_steps/src/outcome.rs
use crate::table::StepSpec;
use remote_exec::{CommandOutput, ExecError};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "exit_code", rename_all = "snake_case")]
pub enum FailureKind {
    /// Nothing ran on the host
    Connection,
    NonZeroExit(i32),
    /// Exit status 0 without the success marker
    MissingMarker,
    /// The command started but was killed by a signal
    Terminated,
    /// The worker driving the step failed; the command may or may not have run
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Connection => write!(f, "connection failure"),
            FailureKind::NonZeroExit(code) => write!(f, "exit status {}", code),
            FailureKind::MissingMarker => write!(f, "success marker missing"),
            FailureKind::Terminated => write!(f, "terminated by a signal"),
            FailureKind::Internal => write!(f, "internal failure"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Safe to re-run the whole deployment once the cause is fixed
    pub recoverable: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Outcome of one step on one machine
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    Succeeded { message: String },
    Failed(StepFailure),
}

impl StepResult {
    pub fn is_success(&self) -> bool {
        matches!(self, StepResult::Succeeded { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            StepResult::Succeeded { message } => message,
            StepResult::Failed(failure) => &failure.message,
        }
    }

    pub fn failure(&self) -> Option<&StepFailure> {
        match self {
            StepResult::Failed(failure) => Some(failure),
            StepResult::Succeeded { .. } => None,
        }
    }

    /// A failure that is not the result of a completed step
    pub fn internal(message: impl Into<String>) -> Self {
        StepResult::Failed(StepFailure {
            kind: FailureKind::Internal,
            message: message.into(),
            recoverable: true,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

impl StepSpec {
    /// Turn what the executor returned into a step outcome
    ///
    /// Connection failures are always recoverable since nothing ran.
    /// Command failures, including a command killed mid-run, take the
    /// step's recoverability.
    pub fn classify(&self, outcome: Result<CommandOutput, ExecError>) -> StepResult {
        let output = match outcome {
            Ok(output) => output,
            Err(e) => {
                let kind = if e.is_connection() {
                    FailureKind::Connection
                } else {
                    FailureKind::Terminated
                };
                return StepResult::Failed(StepFailure {
                    recoverable: kind == FailureKind::Connection || self.command_failure_recoverable,
                    kind,
                    message: e.to_string(),
                    stdout: String::new(),
                    stderr: String::new(),
                })
            }
        };

        let kind = if !output.success() {
            FailureKind::NonZeroExit(output.exit_code)
        } else if !self.marker_present(&output.stdout) {
            FailureKind::MissingMarker
        } else {
            return StepResult::Succeeded {
                message: format!("{} succeeded", self.step),
            };
        };

        StepResult::Failed(StepFailure {
            message: format!("{} failed: {}", self.step, kind),
            kind,
            recoverable: self.command_failure_recoverable,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

use deployment_model::InstallStep;
use serde::Serialize;
use std::fmt;
use tokio::sync::broadcast;

/// Progress notifications published while a run is under way
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    PhaseStarted {
        step: InstallStep,
        machines: Vec<String>,
    },
    HostStarted {
        step: InstallStep,
        machine: String,
    },
    HostSkipped {
        step: InstallStep,
        machine: String,
        reason: String,
    },
    HostFinished {
        step: InstallStep,
        machine: String,
        success: bool,
        message: String,
    },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::PhaseStarted { step, machines } => {
                write!(f, "{}: starting on {}", step, machines.join(", "))
            }
            ProgressEvent::HostStarted { step, machine } => write!(f, "{}: {} running", step, machine),
            ProgressEvent::HostSkipped {
                step,
                machine,
                reason,
            } => write!(f, "{}: {} skipped ({})", step, machine, reason),
            ProgressEvent::HostFinished {
                step,
                machine,
                success,
                message,
            } => {
                let status = if *success { "ok" } else { "FAILED" };
                write!(f, "{}: {} {} - {}", step, machine, status, message)
            }
        }
    }
}

/// Publish an event; nobody listening is fine
pub(crate) fn emit(tx: &broadcast::Sender<ProgressEvent>, event: ProgressEvent) {
    tracing::debug!("{}", event);
    let _ = tx.send(event);
}

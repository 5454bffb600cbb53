//! Install step state machine
//!
//! One table row per [`InstallStep`](deployment_model::InstallStep) says what
//! state the step needs, what state it leaves behind, how success is
//! recognised, and how the controller must schedule and judge it.

mod outcome;
mod table;

pub use outcome::{FailureKind, StepFailure, StepResult};
pub use table::{effective_progress, spec, Applicability, StepSpec, STEPS};

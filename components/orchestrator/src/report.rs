// components/orchestrator/src/report.rs
use chrono::{DateTime, Utc};
use deployment_model::InstallStep;
use install_steps::{StepFailure, StepResult};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// What happened to one machine in one step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub step: InstallStep,
    pub machine: String,
    pub status: StepStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StepFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    /// Every step ran, but diagnostics failed on some machines
    CompletedWithDiagnosticFailures { machines: Vec<String> },
    Aborted {
        step: InstallStep,
        machines: Vec<String>,
        /// Re-running after fixing the cause is expected to succeed
        rerun_safe: bool,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub scope: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: Outcome,
    pub records: Vec<StepRecord>,
}

impl RunReport {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            started_at: Utc::now(),
            finished_at: None,
            outcome: Outcome::Completed,
            records: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, step: InstallStep, machine: &str, result: &StepResult) {
        let (status, failure) = match result {
            StepResult::Succeeded { .. } => (StepStatus::Succeeded, None),
            StepResult::Failed(failure) => (StepStatus::Failed, Some(failure.clone())),
        };
        self.records.push(StepRecord {
            step,
            machine: machine.to_string(),
            status,
            message: result.message().to_string(),
            failure,
        });
    }

    pub(crate) fn skip(&mut self, step: InstallStep, machine: &str, reason: impl Into<String>) {
        self.records.push(StepRecord {
            step,
            machine: machine.to_string(),
            status: StepStatus::Skipped,
            message: reason.into(),
            failure: None,
        });
    }

    pub(crate) fn finish(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self.finished_at = Some(Utc::now());
        self
    }

    /// Records for one step, in the order they were produced
    pub fn for_step(&self, step: InstallStep) -> impl Iterator<Item = &StepRecord> {
        self.records.iter().filter(move |r| r.step == step)
    }

    /// Machines a step actually ran on
    pub fn ran_on(&self, step: InstallStep) -> Vec<&str> {
        self.for_step(step)
            .filter(|r| r.status != StepStatus::Skipped)
            .map(|r| r.machine.as_str())
            .collect()
    }

    /// 0 on success, 1 on abort, 2 when only diagnostics failed
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            Outcome::Completed => 0,
            Outcome::Aborted { .. } => 1,
            Outcome::CompletedWithDiagnosticFailures { .. } => 2,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Deployment run ({})", self.scope)?;
        for record in &self.records {
            let status = match record.status {
                StepStatus::Succeeded => "ok",
                StepStatus::Failed => "FAILED",
                StepStatus::Skipped => "skipped",
            };
            writeln!(
                f,
                "  {:<16} {:<32} {:<8} {}",
                record.step.as_str(),
                record.machine,
                status,
                record.message
            )?;
            if let Some(failure) = &record.failure {
                for (name, text) in [("stdout", &failure.stdout), ("stderr", &failure.stderr)] {
                    for line in text.lines() {
                        writeln!(f, "      {}| {}", name, line)?;
                    }
                }
            }
        }
        match &self.outcome {
            Outcome::Completed => writeln!(f, "Deployment completed."),
            Outcome::CompletedWithDiagnosticFailures { machines } => writeln!(
                f,
                "Deployment completed, but diagnostics failed on {}.",
                machines.join(", ")
            ),
            Outcome::Aborted {
                step,
                machines,
                rerun_safe,
            } => {
                writeln!(f, "Deployment aborted during {} on {}.", step, machines.join(", "))?;
                if *rerun_safe {
                    writeln!(f, "Fix the cause and re-run; completed work will be skipped.")
                } else {
                    writeln!(
                        f,
                        "The failed host is now marked broken and is unlikely to be salvaged by re-running. Manual intervention is required."
                    )
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use install_steps::FailureKind;

    fn failure() -> StepResult {
        StepResult::Failed(StepFailure {
            kind: FailureKind::NonZeroExit(1),
            message: "configure failed: exit status 1".to_string(),
            recoverable: false,
            stdout: "partial output\n".to_string(),
            stderr: "boom\n".to_string(),
        })
    }

    #[test]
    fn exit_codes_follow_outcome() {
        let report = RunReport::new("full deployment");
        assert_eq!(report.clone().finish(Outcome::Completed).exit_code(), 0);
        assert_eq!(
            report
                .clone()
                .finish(Outcome::CompletedWithDiagnosticFailures { machines: vec!["a".into()] })
                .exit_code(),
            2
        );
        assert_eq!(
            report
                .finish(Outcome::Aborted {
                    step: InstallStep::Configure,
                    machines: vec!["a".into()],
                    rerun_safe: false,
                })
                .exit_code(),
            1
        );
    }

    #[test]
    fn aborted_report_shows_output_and_advice() {
        let mut report = RunReport::new("full deployment");
        report.record(InstallStep::Configure, "b.example.com", &failure());
        let report = report.finish(Outcome::Aborted {
            step: InstallStep::Configure,
            machines: vec!["b.example.com".to_string()],
            rerun_safe: false,
        });

        let text = report.to_string();
        assert!(text.contains("stderr| boom"));
        assert!(text.contains("unlikely to be salvaged"));
        assert_eq!(report.ran_on(InstallStep::Configure), vec!["b.example.com"]);
    }

    #[test]
    fn json_report_carries_outcome() {
        let mut report = RunReport::new("full deployment");
        report.skip(InstallStep::Prepare, "a.example.com", "already prepared");
        let json = report.finish(Outcome::Completed).to_json().unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["outcome"]["result"], "completed");
        assert_eq!(value["records"][0]["status"], "skipped");
        assert_eq!(value["records"][0]["step"], "prepare");
    }
}

// components/orchestrator/src/controller.rs
//! Drives the install steps across the planned machines
//!
//! For each step the controller selects the machines that still need it,
//! runs them (all at once for `prepare` and `install`, one at a time in
//! plan order otherwise) and checkpoints every success before moving on.
//! The deployment is only ever touched from the controller's own task.

use crate::checkpoint::Checkpoint;
use crate::error::{DeployError, Result};
use crate::events::{emit, ProgressEvent};
use crate::nameserver::nameserver_address;
use crate::params::{global_params, machine_params, SubscriptionOverrides};
use crate::report::{Outcome, RunReport};
use deploy_planner::{plan, Machine, Plan, Scope};
use deployment_model::{Deployment, InstallState, InstallStep, Subscription, ValidationLevel};
use futures::future::join_all;
use install_steps::{spec, StepResult, StepSpec};
use parking_lot::Mutex;
use remote_exec::{ExecRequest, ExecTarget, Executor, ParamBag};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Provisioner invoked for every step unless configured otherwise
pub const DEFAULT_PROVISIONER: &str = "oo-provision";

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub provisioner: String,
    pub subscription: Subscription,
    pub overrides: SubscriptionOverrides,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            provisioner: DEFAULT_PROVISIONER.to_string(),
            subscription: Subscription::default(),
            overrides: SubscriptionOverrides::default(),
        }
    }
}

/// Result of one step across its candidate machines
enum PhaseOutcome {
    Continue,
    Abort(Outcome),
}

pub struct Controller<C: Checkpoint> {
    executor: Arc<dyn Executor>,
    checkpoint: C,
    settings: RunSettings,
    events: broadcast::Sender<ProgressEvent>,
}

impl<C: Checkpoint> Controller<C> {
    pub fn new(executor: Arc<dyn Executor>, checkpoint: C, settings: RunSettings) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            executor,
            checkpoint,
            settings,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    pub fn checkpoint(&self) -> &C {
        &self.checkpoint
    }

    /// Run every applicable step for `scope`
    ///
    /// Returns `Err` only when the run cannot start or progress can no
    /// longer be saved. A failing step ends the run with an aborted report.
    pub async fn run(&mut self, deployment: &mut Deployment, scope: &Scope) -> Result<RunReport> {
        deployment
            .validate(ValidationLevel::Full)
            .map_err(DeployError::Invalid)?;
        let plan = plan(deployment, scope)?;

        let any_remote = plan
            .machines
            .iter()
            .any(|m| !ExecTarget::new(&m.ssh_target, &m.user).is_local());
        if any_remote {
            self.executor
                .check_available()
                .await
                .map_err(DeployError::Unavailable)?;
        }

        let mut report = RunReport::new(plan.scope.to_string());
        let mut diagnostic_failures = Vec::new();
        // Built before the first step that has work, so runs with nothing
        // to do never query the nameserver
        let mut shared_params: Option<ParamBag> = None;

        for step in plan.steps() {
            let step_spec = spec(step);
            let candidates = self.candidates(deployment, &plan, step_spec, &mut report);
            if candidates.is_empty() {
                info!("{}: nothing to do", step);
                continue;
            }
            let global = match shared_params.take() {
                Some(global) => global,
                None => self.build_global_params(deployment).await?,
            };
            emit(
                &self.events,
                ProgressEvent::PhaseStarted {
                    step,
                    machines: candidates.iter().map(|m| m.name().to_string()).collect(),
                },
            );

            let outcome = if step_spec.parallel {
                self.run_parallel(deployment, &global, step_spec, &candidates, &mut report)
                    .await?
            } else {
                self.run_serial(
                    deployment,
                    &global,
                    step_spec,
                    &candidates,
                    &mut report,
                    &mut diagnostic_failures,
                )
                .await?
            };

            if let PhaseOutcome::Abort(outcome) = outcome {
                error!("Run aborted during {}", step);
                return Ok(report.finish(outcome));
            }
            shared_params = Some(global);
        }

        let outcome = if diagnostic_failures.is_empty() {
            info!("Deployment completed");
            Outcome::Completed
        } else {
            warn!("Diagnostics failed on {}", diagnostic_failures.join(", "));
            Outcome::CompletedWithDiagnosticFailures {
                machines: diagnostic_failures,
            }
        };
        Ok(report.finish(outcome))
    }

    /// Parameters shared by every machine, including the nameserver address
    async fn build_global_params(&self, deployment: &Deployment) -> Result<ParamBag> {
        let nameserver_ip = nameserver_address(deployment, self.executor.as_ref()).await?;
        Ok(global_params(
            deployment,
            &self.settings.subscription,
            &self.settings.overrides,
            nameserver_ip.as_deref(),
        ))
    }

    /// Machines in plan order that the step applies to and still needs
    fn candidates<'p>(
        &self,
        deployment: &Deployment,
        plan: &'p Plan,
        step_spec: &StepSpec,
        report: &mut RunReport,
    ) -> Vec<&'p Machine> {
        let mut selected = Vec::new();
        for machine in &plan.machines {
            if !step_spec.applies(&machine.roles) || plan.is_suppressed(step_spec.step, machine) {
                continue;
            }
            let state = machine.state(deployment);
            let reason = if state.is_broken() {
                Some("host is broken".to_string())
            } else if !step_spec.needs_work(state, machine.progress(deployment)) {
                Some(format!("already done ({})", state))
            } else if !step_spec.precondition_met(state) {
                warn!(
                    "{}: {} is {} but needs {}",
                    step_spec.step,
                    machine.name(),
                    state,
                    step_spec.required_state
                );
                Some(format!("earlier steps incomplete ({})", state))
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    info!("{}: skipping {}: {}", step_spec.step, machine.name(), reason);
                    emit(
                        &self.events,
                        ProgressEvent::HostSkipped {
                            step: step_spec.step,
                            machine: machine.name().to_string(),
                            reason: reason.clone(),
                        },
                    );
                    report.skip(step_spec.step, machine.name(), reason);
                }
                None => selected.push(machine),
            }
        }
        selected
    }

    fn request(
        &self,
        global: &ParamBag,
        deployment: &Deployment,
        machine: &Machine,
        step: InstallStep,
    ) -> (ExecTarget, ExecRequest) {
        let params = machine_params(global, deployment, machine, step);
        (
            ExecTarget::new(&machine.ssh_target, &machine.user),
            ExecRequest::new(&self.settings.provisioner, params),
        )
    }

    async fn run_parallel(
        &mut self,
        deployment: &mut Deployment,
        global: &ParamBag,
        step_spec: &'static StepSpec,
        candidates: &[&Machine],
        report: &mut RunReport,
    ) -> Result<PhaseOutcome> {
        let step = step_spec.step;
        info!("{}: running on {} machine(s) in parallel", step, candidates.len());

        let results: Arc<Mutex<Vec<(usize, StepResult)>>> =
            Arc::new(Mutex::new(Vec::with_capacity(candidates.len())));
        let workers = candidates.iter().enumerate().map(|(index, machine)| {
            let (target, request) = self.request(global, deployment, machine, step);
            let executor = Arc::clone(&self.executor);
            let results = Arc::clone(&results);
            let events = self.events.clone();
            let name = machine.name().to_string();
            tokio::spawn(async move {
                emit(&events, ProgressEvent::HostStarted { step, machine: name });
                let result = step_spec.classify(executor.execute(&target, &request).await);
                results.lock().push((index, result));
            })
        });
        let joined = join_all(workers).await;

        let mut results = std::mem::take(&mut *results.lock());
        for (index, joined) in joined.into_iter().enumerate() {
            if let Err(e) = joined {
                results.push((index, StepResult::internal(format!("worker failed: {}", e))));
            }
        }
        results.sort_by_key(|(index, _)| *index);

        let mut failed = Vec::new();
        let mut rerun_safe = true;
        for (index, result) in results {
            let machine = candidates[index];
            self.finish_host(step, machine, &result, report);
            match &result {
                StepResult::Succeeded { .. } => self.commit(deployment, machine, step_spec)?,
                StepResult::Failed(failure) => {
                    error!("{}: {} failed: {}", step, machine.name(), failure.message);
                    if !failure.recoverable {
                        rerun_safe = false;
                        self.break_machine(deployment, machine)?;
                    }
                    failed.push(machine.name().to_string());
                }
            }
        }

        if failed.is_empty() {
            Ok(PhaseOutcome::Continue)
        } else {
            Ok(PhaseOutcome::Abort(Outcome::Aborted {
                step,
                machines: failed,
                rerun_safe,
            }))
        }
    }

    async fn run_serial(
        &mut self,
        deployment: &mut Deployment,
        global: &ParamBag,
        step_spec: &'static StepSpec,
        candidates: &[&Machine],
        report: &mut RunReport,
        diagnostic_failures: &mut Vec<String>,
    ) -> Result<PhaseOutcome> {
        let step = step_spec.step;
        for machine in candidates {
            let (target, request) = self.request(global, deployment, machine, step);
            emit(
                &self.events,
                ProgressEvent::HostStarted {
                    step,
                    machine: machine.name().to_string(),
                },
            );
            let result = step_spec.classify(self.executor.execute(&target, &request).await);
            self.finish_host(step, machine, &result, report);

            let failure = match &result {
                StepResult::Succeeded { .. } => {
                    self.commit(deployment, machine, step_spec)?;
                    continue;
                }
                StepResult::Failed(failure) => failure,
            };

            if !step_spec.fatal {
                warn!("{}: {} failed: {}", step, machine.name(), failure.message);
                diagnostic_failures.push(machine.name().to_string());
                continue;
            }

            error!("{}: {} failed: {}", step, machine.name(), failure.message);
            if !failure.recoverable {
                self.break_machine(deployment, machine)?;
            }
            return Ok(PhaseOutcome::Abort(Outcome::Aborted {
                step,
                machines: vec![machine.name().to_string()],
                rerun_safe: failure.recoverable,
            }));
        }
        Ok(PhaseOutcome::Continue)
    }

    fn finish_host(&self, step: InstallStep, machine: &Machine, result: &StepResult, report: &mut RunReport) {
        report.record(step, machine.name(), result);
        emit(
            &self.events,
            ProgressEvent::HostFinished {
                step,
                machine: machine.name().to_string(),
                success: result.is_success(),
                message: result.message().to_string(),
            },
        );
    }

    /// Record a successful step for every identity on the machine and persist
    fn commit(&mut self, deployment: &mut Deployment, machine: &Machine, step_spec: &StepSpec) -> Result<()> {
        for member in &machine.members {
            deployment.record_step(member, step_spec.resulting_state, step_spec.step)?;
        }
        self.checkpoint
            .persist(deployment)
            .map_err(DeployError::Checkpoint)?;
        info!("{}: {} is now {}", step_spec.step, machine.name(), machine.state(deployment));
        Ok(())
    }

    fn break_machine(&mut self, deployment: &mut Deployment, machine: &Machine) -> Result<()> {
        for member in &machine.members {
            deployment.mark_broken(member)?;
        }
        error!(
            "{} is now {}; re-running is unlikely to salvage it",
            machine.name(),
            InstallState::Broken
        );
        self.checkpoint
            .persist(deployment)
            .map_err(DeployError::Checkpoint)
    }
}

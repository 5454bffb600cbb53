//! In-memory stand-ins for the executor and checkpoint store

use crate::checkpoint::Checkpoint;
use async_trait::async_trait;
use deployment_model::{ConfigError, Deployment, HostInstance, InstallStep, Role};
use install_steps::spec;
use parking_lot::Mutex;
use remote_exec::{CommandOutput, ExecError, ExecRequest, ExecTarget, Executor, ParamBag};
use std::collections::HashMap;

/// Keeps every persisted snapshot in memory
#[derive(Default)]
pub struct MemoryCheckpoint {
    pub snapshots: Vec<Deployment>,
    pub fail: bool,
}

impl Checkpoint for MemoryCheckpoint {
    fn persist(&mut self, deployment: &Deployment) -> Result<(), ConfigError> {
        if self.fail {
            return Err(ConfigError::write(
                "memory",
                std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            ));
        }
        self.snapshots.push(deployment.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Response {
    Exit(i32),
    NoMarker,
    Unreachable,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub target: String,
    pub command: String,
    pub step: Option<InstallStep>,
    pub params: ParamBag,
}

/// Records every command and answers with the step's marker unless told otherwise
#[derive(Default)]
pub struct ScriptedExecutor {
    calls: Mutex<Vec<Call>>,
    script: Mutex<HashMap<(String, InstallStep), Response>>,
    address_listing: Option<String>,
    ssh_missing: bool,
}

impl ScriptedExecutor {
    /// Answer address queries with `listing` as `ip -4 addr show` output
    pub fn with_address_listing(mut self, listing: &str) -> Self {
        self.address_listing = Some(listing.to_string());
        self
    }

    /// Behave as if no ssh client is installed
    pub fn without_ssh(mut self) -> Self {
        self.ssh_missing = true;
        self
    }

    pub fn respond(&self, target: &str, step: InstallStep, response: Response) {
        self.script.lock().insert((target.to_string(), step), response);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Targets a step was sent to, in call order
    pub fn targets(&self, step: InstallStep) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.step == Some(step))
            .map(|c| c.target.clone())
            .collect()
    }

    pub fn step_calls(&self) -> usize {
        self.calls.lock().iter().filter(|c| c.step.is_some()).count()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn check_available(&self) -> Result<(), ExecError> {
        if self.ssh_missing {
            Err(ExecError::SshUnavailable)
        } else {
            Ok(())
        }
    }

    async fn execute(
        &self,
        target: &ExecTarget,
        request: &ExecRequest,
    ) -> Result<CommandOutput, ExecError> {
        let step = request
            .params
            .get("CONF_INSTALL_STEP")
            .and_then(|s| s.parse::<InstallStep>().ok());
        self.calls.lock().push(Call {
            target: target.ssh_target.clone(),
            command: request.command.clone(),
            step,
            params: request.params.clone(),
        });

        let Some(step) = step else {
            return Ok(CommandOutput {
                exit_code: 0,
                stdout: self.address_listing.clone().unwrap_or_default(),
                stderr: String::new(),
            });
        };

        let response = self
            .script
            .lock()
            .get(&(target.ssh_target.clone(), step))
            .copied();
        let marker = format!("working...\n{}\n", spec(step).success_marker);
        match response {
            None => Ok(CommandOutput {
                exit_code: 0,
                stdout: marker,
                stderr: String::new(),
            }),
            Some(Response::Exit(code)) => Ok(CommandOutput {
                exit_code: code,
                stdout: "working...\n".to_string(),
                stderr: format!("{} blew up\n", step),
            }),
            Some(Response::NoMarker) => Ok(CommandOutput {
                exit_code: 0,
                stdout: "working...\ninternal fault logged\n".to_string(),
                stderr: String::new(),
            }),
            Some(Response::Unreachable) => Err(ExecError::connection(
                &target.ssh_target,
                "Connection timed out",
            )),
        }
    }
}

pub fn secured(host: HostInstance) -> HostInstance {
    host.with_attribute("mcollective_password", "mcpass")
        .with_attribute("mongodb_broker_password", "dbpass")
}

/// A: broker+msgserver+dbserver, B and C: nodes, all new
pub fn three_host_cluster() -> Deployment {
    Deployment {
        brokers: vec![secured(HostInstance::new(
            "a.example.com",
            "10.0.0.1",
            "root",
            [Role::Broker, Role::MsgServer, Role::DbServer],
        ))],
        nodes: vec![
            secured(HostInstance::new("b.example.com", "10.0.0.2", "root", [Role::Node])),
            secured(HostInstance::new("c.example.com", "10.0.0.3", "root", [Role::Node])),
        ],
        ..Deployment::default()
    }
}

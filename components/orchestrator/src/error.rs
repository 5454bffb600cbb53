//! Errors that stop a run before or outside step execution
//!
//! A failing step is not an error here: it ends the run with an aborted
//! [`RunReport`](crate::RunReport).

use deploy_planner::PlanError;
use deployment_model::{ConfigError, ModelError, Violation};
use remote_exec::ExecError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("cannot plan the run: {0}")]
    Plan(#[from] PlanError),

    #[error("the deployment is not valid ({} problem(s))", .0.len())]
    Invalid(Vec<Violation>),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("remote execution is unavailable")]
    Unavailable(#[source] ExecError),

    #[error("could not determine the IP address of nameserver {host}")]
    NameserverAddress { host: String },

    /// Progress could not be saved, so a re-run might repeat finished work
    #[error("failed to checkpoint deployment state")]
    Checkpoint(#[source] ConfigError),
}

pub type Result<T> = std::result::Result<T, DeployError>;

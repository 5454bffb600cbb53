//! Deployment execution controller
//!
//! Takes a validated [`Deployment`](deployment_model::Deployment), plans the
//! machines to touch, and drives the install steps over a
//! [`remote_exec::Executor`], checkpointing after every successful step so
//! an interrupted or failed run can simply be started again.

mod checkpoint;
mod controller;
mod error;
mod events;
mod nameserver;
mod params;
mod report;

pub use checkpoint::Checkpoint;
pub use controller::{Controller, RunSettings, DEFAULT_PROVISIONER};
pub use error::{DeployError, Result};
pub use events::ProgressEvent;
pub use nameserver::nameserver_address;
pub use params::{global_params, machine_params, SubscriptionOverrides};
pub use report::{Outcome, RunReport, StepRecord, StepStatus};

#[cfg(test)]
mod stub;

use deployment_model::{ConfigError, ConfigStore, Deployment};

/// Durable storage for deployment progress
pub trait Checkpoint: Send {
    fn persist(&mut self, deployment: &Deployment) -> Result<(), ConfigError>;
}

impl Checkpoint for ConfigStore {
    fn persist(&mut self, deployment: &Deployment) -> Result<(), ConfigError> {
        self.save_deployment(deployment)
    }
}

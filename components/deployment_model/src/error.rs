//! Deployment model error types

use crate::role::Role;
use std::path::PathBuf;
use thiserror::Error;

/// Failures reading or writing the persisted configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration file {path} is not valid")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("failed to write configuration file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize configuration")]
    Serialize(#[source] serde_yaml_ng::Error),

    #[error("configuration file {path} has no Deployment section")]
    MissingDeployment { path: PathBuf },
}

impl ConfigError {
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::Read {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::Write {
            path: path.into(),
            source,
        }
    }
}

/// Rejected mutations of the deployment model
#[derive(Error, Debug, PartialEq)]
pub enum ModelError {
    #[error("no host named {0} in the deployment")]
    UnknownHost(String),

    #[error("host {0} is already part of the deployment")]
    DuplicateHost(String),

    #[error("role {role} is already held by {held_by}, cannot also assign it to {requested_by}")]
    StateConflict {
        role: Role,
        held_by: String,
        requested_by: String,
    },
}

pub type Result<T> = std::result::Result<T, ModelError>;

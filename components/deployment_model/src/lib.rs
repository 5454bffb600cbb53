//! Fleet deployment model
//!
//! Hosts, their role assignments, DNS settings and install progress, plus
//! the persisted configuration document they are loaded from and
//! checkpointed to.

pub mod config;
pub mod deployment;
pub mod dns;
pub mod error;
pub mod host;
pub mod role;
pub mod state;
pub mod validate;

pub use config::{ConfigFile, ConfigStore, Subscription};
pub use deployment::Deployment;
pub use dns::DnsConfig;
pub use error::{ConfigError, ModelError};
pub use host::{HostInstance, LOCALHOST};
pub use role::{Role, RoleDescriptor, ROLE_DESCRIPTORS, SUBSCRIPTION_BINDINGS};
pub use state::{InstallState, InstallStep};
pub use validate::{ValidationLevel, Violation};

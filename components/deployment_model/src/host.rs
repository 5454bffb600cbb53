// components/deployment_model/src/host.rs
use crate::role::Role;
use crate::state::{InstallState, InstallStep};
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Target name meaning "run on the orchestrating machine itself"
pub const LOCALHOST: &str = "localhost";

/// A managed machine entry in the deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostInstance {
    /// Fully qualified name, the stable logical identity
    pub host: String,

    /// Address used to reach the machine
    pub ssh_host: String,

    /// Remote execution principal
    pub user: String,

    #[serde(default)]
    pub roles: BTreeSet<Role>,

    #[serde(rename = "status", default)]
    pub install_state: InstallState,

    /// Last step checkpointed for this host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<InstallStep>,

    /// Role attributes and any field this tool does not interpret
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl HostInstance {
    pub fn new(
        host: impl Into<String>,
        ssh_host: impl Into<String>,
        user: impl Into<String>,
        roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        Self {
            host: host.into(),
            ssh_host: ssh_host.into(),
            user: user.into(),
            roles: roles.into_iter().collect(),
            install_state: InstallState::New,
            progress: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_state(mut self, state: InstallState) -> Self {
        self.install_state = state;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_local(&self) -> bool {
        self.ssh_host == LOCALHOST
    }

    /// Scalar attribute rendered as text
    ///
    /// Sequences and maps have no single textual form and yield `None`.
    pub fn attribute(&self, name: &str) -> Option<String> {
        scalar_text(self.attributes.get(name)?)
    }
}

pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// components/deployment_model/src/deployment.rs
use crate::dns::DnsConfig;
use crate::error::{ModelError, Result};
use crate::host::HostInstance;
use crate::role::Role;
use crate::state::{InstallState, InstallStep};
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// The whole fleet: host lists keyed by role category plus DNS settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    #[serde(rename = "NameServers", default, skip_serializing_if = "Vec::is_empty")]
    pub nameservers: Vec<HostInstance>,

    #[serde(rename = "DBServers", default)]
    pub dbservers: Vec<HostInstance>,

    #[serde(rename = "MsgServers", default)]
    pub msgservers: Vec<HostInstance>,

    #[serde(rename = "Brokers", default)]
    pub brokers: Vec<HostInstance>,

    #[serde(rename = "Nodes", default)]
    pub nodes: Vec<HostInstance>,

    #[serde(rename = "DNS", default)]
    pub dns: DnsConfig,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Deployment {
    /// Host list for the category a role is assigned through
    pub fn hosts_in(&self, category: Role) -> &[HostInstance] {
        match category {
            Role::NameServer => &self.nameservers,
            Role::DbServer => &self.dbservers,
            Role::MsgServer => &self.msgservers,
            Role::Broker => &self.brokers,
            Role::Node => &self.nodes,
        }
    }

    fn hosts_in_mut(&mut self, category: Role) -> &mut Vec<HostInstance> {
        match category {
            Role::NameServer => &mut self.nameservers,
            Role::DbServer => &mut self.dbservers,
            Role::MsgServer => &mut self.msgservers,
            Role::Broker => &mut self.brokers,
            Role::Node => &mut self.nodes,
        }
    }

    /// Every entry with the category it is listed under
    ///
    /// Categories come in dependency precedence order, entries within a
    /// category in list order. The order is stable across calls.
    pub fn iter_hosts(&self) -> impl Iterator<Item = (Role, &HostInstance)> {
        Role::ALL
            .into_iter()
            .flat_map(move |category| self.hosts_in(category).iter().map(move |h| (category, h)))
    }

    fn iter_hosts_mut(&mut self) -> impl Iterator<Item = &mut HostInstance> {
        self.nameservers
            .iter_mut()
            .chain(self.dbservers.iter_mut())
            .chain(self.msgservers.iter_mut())
            .chain(self.brokers.iter_mut())
            .chain(self.nodes.iter_mut())
    }

    /// All entries carrying `role`, whichever list they are in
    pub fn hosts_with_role(&self, role: Role) -> impl Iterator<Item = &HostInstance> {
        self.iter_hosts()
            .map(|(_, host)| host)
            .filter(move |host| host.has_role(role))
    }

    pub fn find(&self, host: &str) -> Option<&HostInstance> {
        self.iter_hosts().map(|(_, h)| h).find(|h| h.host == host)
    }

    pub fn find_mut(&mut self, host: &str) -> Option<&mut HostInstance> {
        self.iter_hosts_mut().find(|h| h.host == host)
    }

    /// All entries reached through the same SSH target
    pub fn hosts_sharing_target<'a>(
        &'a self,
        ssh_host: &'a str,
    ) -> impl Iterator<Item = &'a HostInstance> + 'a {
        self.iter_hosts()
            .map(|(_, h)| h)
            .filter(move |h| h.ssh_host == ssh_host)
    }

    /// True when the DNS service is deployed as part of the platform
    pub fn deploys_dns(&self) -> bool {
        self.dns
            .deploy_dns
            .unwrap_or_else(|| self.hosts_with_role(Role::NameServer).next().is_some())
    }

    fn singleton_holder(&self, role: Role, except: &str) -> Option<&HostInstance> {
        if !role.is_singleton() {
            return None;
        }
        self.hosts_with_role(role).find(|h| h.host != except)
    }

    /// Give an existing host an additional role
    ///
    /// A singleton role already held by another host is rejected and the
    /// deployment is left untouched.
    pub fn assign_role(&mut self, host: &str, role: Role) -> Result<()> {
        if self.find(host).is_none() {
            return Err(ModelError::UnknownHost(host.to_string()));
        }
        if let Some(holder) = self.singleton_holder(role, host) {
            return Err(ModelError::StateConflict {
                role,
                held_by: holder.host.clone(),
                requested_by: host.to_string(),
            });
        }
        if let Some(entry) = self.find_mut(host) {
            entry.roles.insert(role);
        }
        Ok(())
    }

    /// Append a host to a category list
    ///
    /// The host is given the category's role if it does not already carry
    /// it. Duplicate identities and second holders of singleton roles are
    /// rejected.
    pub fn add_host(&mut self, category: Role, mut host: HostInstance) -> Result<()> {
        if self.find(&host.host).is_some() {
            return Err(ModelError::DuplicateHost(host.host));
        }
        host.roles.insert(category);
        for role in host.roles.iter().copied() {
            if let Some(holder) = self.singleton_holder(role, &host.host) {
                return Err(ModelError::StateConflict {
                    role,
                    held_by: holder.host.clone(),
                    requested_by: host.host.clone(),
                });
            }
        }
        info!("Adding {} to {}", host.host, category.descriptor().category);
        self.hosts_in_mut(category).push(host);
        Ok(())
    }

    /// Operator reset: back to `new` with no recorded progress
    ///
    /// This is the only way a host's state moves backwards, and the only
    /// way out of `broken`. Returns the state the host had before.
    pub fn reset_host(&mut self, host: &str) -> Result<InstallState> {
        let entry = self
            .find_mut(host)
            .ok_or_else(|| ModelError::UnknownHost(host.to_string()))?;
        let previous = entry.install_state;
        entry.install_state = InstallState::New;
        entry.progress = None;
        warn!("Reset {} from {} to new", host, previous);
        Ok(previous)
    }

    /// Checkpoint a completed step for a host
    pub fn record_step(&mut self, host: &str, state: InstallState, step: InstallStep) -> Result<()> {
        let entry = self
            .find_mut(host)
            .ok_or_else(|| ModelError::UnknownHost(host.to_string()))?;
        entry.install_state = entry.install_state.advanced_to(state);
        entry.progress = Some(entry.progress.map_or(step, |p| p.max(step)));
        Ok(())
    }

    pub fn mark_broken(&mut self, host: &str) -> Result<()> {
        let entry = self
            .find_mut(host)
            .ok_or_else(|| ModelError::UnknownHost(host.to_string()))?;
        entry.install_state = InstallState::Broken;
        Ok(())
    }
}

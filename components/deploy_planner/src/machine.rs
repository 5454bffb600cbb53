use deployment_model::{Deployment, HostInstance, InstallState, InstallStep, Role};
use install_steps::effective_progress;
use std::collections::BTreeSet;

/// One physical machine: every host entry reached through the same SSH target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    pub ssh_target: String,
    pub user: String,
    /// Host identities colocated here, in configuration order
    pub members: Vec<String>,
    pub roles: BTreeSet<Role>,
}

impl Machine {
    pub(crate) fn from_host(host: &HostInstance) -> Self {
        Self {
            ssh_target: host.ssh_host.clone(),
            user: host.user.clone(),
            members: vec![host.host.clone()],
            roles: host.roles.clone(),
        }
    }

    pub(crate) fn absorb(&mut self, host: &HostInstance) {
        if !self.members.contains(&host.host) {
            self.members.push(host.host.clone());
        }
        self.roles.extend(host.roles.iter().copied());
    }

    /// Earliest role by dependency precedence
    pub fn lead_role(&self) -> Option<Role> {
        self.roles.iter().next().copied()
    }

    /// Name used in reports: the first colocated identity
    pub fn name(&self) -> &str {
        self.members.first().map(String::as_str).unwrap_or(&self.ssh_target)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    fn member_entries<'a>(&'a self, deployment: &'a Deployment) -> impl Iterator<Item = &'a HostInstance> + 'a {
        self.members.iter().filter_map(move |m| deployment.find(m))
    }

    /// The least advanced state among the members
    ///
    /// One broken member makes the whole machine broken.
    pub fn state(&self, deployment: &Deployment) -> InstallState {
        let mut least: Option<InstallState> = None;
        for entry in self.member_entries(deployment) {
            let state = entry.install_state;
            if state.is_broken() {
                return InstallState::Broken;
            }
            least = Some(match least {
                Some(current) if current.rank() <= state.rank() => current,
                _ => state,
            });
        }
        least.unwrap_or_default()
    }

    /// The least progress among the members
    pub fn progress(&self, deployment: &Deployment) -> Option<InstallStep> {
        self.member_entries(deployment)
            .map(|entry| effective_progress(entry.install_state, entry.progress))
            .min()
            .flatten()
    }
}

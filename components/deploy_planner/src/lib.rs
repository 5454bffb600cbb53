// components/deploy_planner/src/lib.rs
//! Dependency-ordered execution plan
//!
//! The plan is a list of machines, not roles. Machines are ordered by the
//! earliest role they carry (nameserver, dbserver, msgserver, broker, node)
//! and, among equals, by where they first appear in the configuration.

mod machine;

pub use machine::Machine;

use deployment_model::{Deployment, InstallState, InstallStep, Role};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, PartialEq)]
pub enum PlanError {
    #[error("no host named {0} in the deployment")]
    UnknownHost(String),

    #[error("{host} also carries {}; nodes can only be added as standalone machines", .roles.join(", "))]
    NotStandaloneNode { host: String, roles: Vec<String> },

    #[error("the deployment contains no hosts")]
    EmptyDeployment,
}

/// What a run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Full,
    /// Bring one new node into an existing deployment
    AddNode(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Full => write!(f, "full deployment"),
            Scope::AddNode(host) => write!(f, "add node {}", host),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub scope: Scope,
    pub machines: Vec<Machine>,
    suppressed: BTreeSet<InstallStep>,
}

impl Plan {
    /// True if `step` is withheld from `machine` in this scope
    ///
    /// Suppression only covers the node being added. Dependencies pulled
    /// in because they never completed still get every step they need.
    pub fn is_suppressed(&self, step: InstallStep, machine: &Machine) -> bool {
        match &self.scope {
            Scope::Full => false,
            Scope::AddNode(target) => {
                self.suppressed.contains(&step) && machine.members.iter().any(|m| m == target)
            }
        }
    }

    /// Steps that reach at least one planned machine, in order
    pub fn steps(&self) -> impl Iterator<Item = InstallStep> + '_ {
        InstallStep::ALL.into_iter().filter(move |step| {
            self.machines
                .iter()
                .any(|machine| !self.is_suppressed(*step, machine))
        })
    }

    pub fn machine_names(&self) -> Vec<&str> {
        self.machines.iter().map(Machine::name).collect()
    }
}

/// Group host entries into machines and order them by precedence
pub fn machines(deployment: &Deployment) -> Vec<Machine> {
    let mut grouped: Vec<Machine> = Vec::new();
    for (_, host) in deployment.iter_hosts() {
        match grouped.iter_mut().find(|m| m.ssh_target == host.ssh_host) {
            Some(machine) => machine.absorb(host),
            None => grouped.push(Machine::from_host(host)),
        }
    }
    // stable: ties keep first-appearance order
    grouped.sort_by_key(|m| m.lead_role());
    grouped
}

pub fn plan(deployment: &Deployment, scope: &Scope) -> Result<Plan, PlanError> {
    let all = machines(deployment);
    if all.is_empty() {
        return Err(PlanError::EmptyDeployment);
    }

    let plan = match scope {
        Scope::Full => Plan {
            scope: scope.clone(),
            machines: all,
            suppressed: BTreeSet::new(),
        },
        Scope::AddNode(target) => {
            let entry = deployment
                .find(target)
                .ok_or_else(|| PlanError::UnknownHost(target.clone()))?;
            let others: Vec<String> = all
                .iter()
                .filter(|m| m.ssh_target == entry.ssh_host)
                .flat_map(|m| m.roles.iter())
                .filter(|role| **role != Role::Node)
                .map(Role::to_string)
                .collect();
            if !others.is_empty() || !entry.has_role(Role::Node) {
                return Err(PlanError::NotStandaloneNode {
                    host: target.clone(),
                    roles: others,
                });
            }

            let machines = all
                .into_iter()
                .filter(|machine| {
                    if machine.ssh_target == entry.ssh_host {
                        return true;
                    }
                    let is_dependency = machine.roles.iter().any(|role| *role != Role::Node);
                    let state = machine.state(deployment);
                    let pending = !state.is_broken() && !state.satisfies(InstallState::Completed);
                    if is_dependency && pending {
                        debug!("{} is a dependency that is not yet complete", machine.name());
                    }
                    is_dependency && pending
                })
                .collect();
            Plan {
                scope: scope.clone(),
                machines,
                suppressed: [InstallStep::DefineHosts].into_iter().collect(),
            }
        }
    };

    info!("Planned {} over {} machine(s): {}", plan.scope, plan.machines.len(), plan.machine_names().join(", "));
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use deployment_model::HostInstance;

    fn three_hosts() -> Deployment {
        Deployment {
            brokers: vec![HostInstance::new(
                "a.example.com",
                "10.0.0.1",
                "root",
                [Role::Broker, Role::MsgServer, Role::DbServer],
            )],
            nodes: vec![
                HostInstance::new("b.example.com", "10.0.0.2", "root", [Role::Node]),
                HostInstance::new("c.example.com", "10.0.0.3", "root", [Role::Node]),
            ],
            ..Deployment::default()
        }
    }

    fn validated(mut deployment: Deployment) -> Deployment {
        for host in deployment.brokers.iter_mut().chain(deployment.nodes.iter_mut()) {
            host.install_state = InstallState::Validated;
        }
        deployment
    }

    #[test]
    fn broker_precedes_nodes() {
        let plan = plan(&three_hosts(), &Scope::Full).unwrap();
        assert_eq!(
            plan.machine_names(),
            vec!["a.example.com", "b.example.com", "c.example.com"]
        );
        assert_eq!(plan.steps().count(), 6);
    }

    #[test]
    fn earliest_role_wins_over_list_position() {
        let mut deployment = three_hosts();
        deployment.nodes.insert(
            0,
            HostInstance::new("late.example.com", "10.0.0.9", "root", [Role::Node]),
        );
        deployment.msgservers.push(HostInstance::new(
            "mq.example.com",
            "10.0.0.8",
            "root",
            [Role::MsgServer],
        ));
        deployment.brokers[0].roles.remove(&Role::MsgServer);

        let plan = plan(&deployment, &Scope::Full).unwrap();
        assert_eq!(
            plan.machine_names(),
            vec![
                "a.example.com",
                "mq.example.com",
                "late.example.com",
                "b.example.com",
                "c.example.com"
            ]
        );
    }

    #[test]
    fn colocated_entries_are_one_machine() {
        let mut deployment = three_hosts();
        deployment.nameservers.push(HostInstance::new(
            "ns.example.com",
            "10.0.0.1",
            "root",
            [Role::NameServer],
        ));

        let plan = plan(&deployment, &Scope::Full).unwrap();
        assert_eq!(plan.machines.len(), 3);
        let first = &plan.machines[0];
        assert_eq!(first.members, vec!["ns.example.com", "a.example.com"]);
        assert!(first.has_role(Role::Broker));
        assert!(first.has_role(Role::NameServer));
    }

    #[test]
    fn add_node_plans_only_the_new_node() {
        let mut deployment = validated(three_hosts());
        deployment
            .add_host(
                Role::Node,
                HostInstance::new("d.example.com", "10.0.0.4", "root", []),
            )
            .unwrap();

        let plan = plan(&deployment, &Scope::AddNode("d.example.com".to_string())).unwrap();

        assert_eq!(plan.machine_names(), vec!["d.example.com"]);
        assert!(plan.is_suppressed(InstallStep::DefineHosts, &plan.machines[0]));
        assert!(!plan.steps().any(|s| s == InstallStep::DefineHosts));
    }

    #[test]
    fn add_node_pulls_in_incomplete_dependencies() {
        let mut deployment = validated(three_hosts());
        deployment.brokers[0].install_state = InstallState::Installed;
        deployment
            .add_host(
                Role::Node,
                HostInstance::new("d.example.com", "10.0.0.4", "root", []),
            )
            .unwrap();

        let plan = plan(&deployment, &Scope::AddNode("d.example.com".to_string())).unwrap();
        assert_eq!(plan.machine_names(), vec!["a.example.com", "d.example.com"]);

        let (broker, node) = (&plan.machines[0], &plan.machines[1]);
        assert!(!plan.is_suppressed(InstallStep::DefineHosts, broker));
        assert!(plan.is_suppressed(InstallStep::DefineHosts, node));
        assert!(plan.steps().any(|s| s == InstallStep::DefineHosts));
    }

    #[test]
    fn nameserver_machine_precedes_broker_machine() {
        let mut deployment = three_hosts();
        deployment.nameservers.push(HostInstance::new(
            "ns.example.com",
            "10.0.0.9",
            "root",
            [Role::NameServer],
        ));
        deployment.brokers[0].roles.remove(&Role::DbServer);
        deployment.dbservers.push(HostInstance::new(
            "db.example.com",
            "10.0.0.8",
            "root",
            [Role::DbServer],
        ));

        let plan = plan(&deployment, &Scope::Full).unwrap();
        assert_eq!(
            plan.machine_names(),
            vec![
                "ns.example.com",
                "db.example.com",
                "a.example.com",
                "b.example.com",
                "c.example.com"
            ]
        );
    }

    #[test]
    fn add_node_rejects_unknown_host() {
        let result = plan(&three_hosts(), &Scope::AddNode("x.example.com".to_string()));
        assert_matches!(result, Err(PlanError::UnknownHost(host)) if host == "x.example.com");
    }

    #[test]
    fn add_node_rejects_colocated_node() {
        let mut deployment = three_hosts();
        deployment.nodes[0].ssh_host = "10.0.0.1".to_string();

        let result = plan(&deployment, &Scope::AddNode("b.example.com".to_string()));
        assert_matches!(result, Err(PlanError::NotStandaloneNode { .. }));
    }

    #[test]
    fn empty_deployment_cannot_be_planned() {
        assert_eq!(
            plan(&Deployment::default(), &Scope::Full),
            Err(PlanError::EmptyDeployment)
        );
    }
}

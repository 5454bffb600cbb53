// components/deployment_model/src/validate.rs
//! Deployment invariant checks
//!
//! `Basic` stops at the first violation and is meant for gating. `Full`
//! walks every rule so an operator can fix the whole configuration in one
//! pass.

use crate::deployment::Deployment;
use crate::host::{scalar_text, HostInstance, LOCALHOST};
use crate::role::Role;
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationLevel {
    Basic,
    Full,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Violation {
    #[error("host {host} is listed under {category} but does not carry the {role} role")]
    WrongCategory {
        host: String,
        category: &'static str,
        role: Role,
    },

    #[error("host identity {host} is used by {count} entries")]
    DuplicateHost { host: String, count: usize },

    #[error("host {host} has no roles")]
    NoRoles { host: String },

    #[error("{field} '{domain}' is not a valid domain name")]
    MalformedDomain { field: &'static str, domain: String },

    #[error("there must be at least one {0} in the deployment")]
    MissingRole(Role),

    #[error("only one host may carry the {role} role, but it is assigned to {}", .hosts.join(", "))]
    SingletonRoleShared { role: Role, hosts: Vec<String> },

    #[error("{field} '{value}' of host {host} is not a valid hostname or IPv4 address")]
    InvalidHostname {
        host: String,
        field: &'static str,
        value: String,
    },

    #[error("user '{user}' of host {host} is not a valid user name")]
    InvalidUser { host: String, user: String },

    #[error("entries reached through {ssh_host} disagree on the user: {}", .users.join(", "))]
    ConflictingUsers { ssh_host: String, users: Vec<String> },

    #[error("component hosts are registered with DNS but no component domain is set")]
    ComponentDomainMissing,

    #[error("host {host} is not in the component domain {domain}")]
    OutsideComponentDomain { host: String, domain: String },

    #[error("a nameserver is designated but DNS deployment is turned off")]
    NameserverWithoutDns,

    #[error("node host {host} must not share its machine with other roles")]
    NodeNotStandalone { host: String },

    #[error("host {host} carries the {role} role but has no '{attribute}' setting")]
    MissingAttribute {
        host: String,
        role: Role,
        attribute: &'static str,
    },

    #[error("hosts {} disagree on the value of '{attribute}'", .hosts.join(", "))]
    InconsistentSharedAttribute {
        attribute: &'static str,
        hosts: Vec<String>,
    },
}

struct Checker {
    level: ValidationLevel,
    found: Vec<Violation>,
}

impl Checker {
    fn push(&mut self, violation: Violation) {
        self.found.push(violation);
    }

    fn done(&self) -> bool {
        self.level == ValidationLevel::Basic && !self.found.is_empty()
    }
}

macro_rules! report {
    ($checker:expr, $violation:expr) => {{
        $checker.push($violation);
        if $checker.done() {
            return;
        }
    }};
}

type Rule = fn(&Deployment, &mut Checker);

const RULES: &[Rule] = &[
    check_dns,
    check_categories,
    check_required_roles,
    check_identities,
    check_host_fields,
    check_shared_targets,
    check_singletons,
    check_node_isolation,
    check_attributes,
];

impl Deployment {
    pub fn validate(&self, level: ValidationLevel) -> Result<(), Vec<Violation>> {
        let mut checker = Checker {
            level,
            found: Vec::new(),
        };
        for rule in RULES {
            rule(self, &mut checker);
            if checker.done() {
                break;
            }
        }
        if checker.found.is_empty() {
            Ok(())
        } else {
            Err(checker.found)
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate(ValidationLevel::Basic).is_ok()
    }
}

/// Lowercase dotted name with an alphabetic top-level label
pub fn is_valid_domain(domain: &str) -> bool {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || domain.len() > 253 {
        return false;
    }
    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    });
    let tld = labels[labels.len() - 1];
    labels_ok && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_lowercase())
}

/// Hostname, `localhost`, or an IPv4 address
pub fn is_valid_hostname(name: &str) -> bool {
    if name == LOCALHOST || name.parse::<Ipv4Addr>().is_ok() {
        return true;
    }
    if name.is_empty() || name.len() > 253 {
        return false;
    }
    name.split('.').all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

pub fn is_valid_username(user: &str) -> bool {
    let mut chars = user.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        }
        _ => false,
    }
}

fn domain_of(fqdn: &str) -> &str {
    fqdn.split_once('.').map(|(_, domain)| domain).unwrap_or("")
}

fn check_dns(deployment: &Deployment, checker: &mut Checker) {
    let dns = &deployment.dns;
    if !is_valid_domain(&dns.app_domain) {
        report!(
            checker,
            Violation::MalformedDomain {
                field: "app_domain",
                domain: dns.app_domain.clone(),
            }
        );
    }
    if let Some(component_domain) = &dns.component_domain {
        if !is_valid_domain(component_domain) {
            report!(
                checker,
                Violation::MalformedDomain {
                    field: "component_domain",
                    domain: component_domain.clone(),
                }
            );
        }
    }
    if dns.deploy_dns == Some(false) && !deployment.nameservers.is_empty() {
        report!(checker, Violation::NameserverWithoutDns);
    }
    if deployment.deploys_dns() && dns.registers_components() {
        match &dns.component_domain {
            None => report!(checker, Violation::ComponentDomainMissing),
            Some(domain) => {
                for (_, host) in deployment.iter_hosts() {
                    if domain_of(&host.host) != domain {
                        report!(
                            checker,
                            Violation::OutsideComponentDomain {
                                host: host.host.clone(),
                                domain: domain.clone(),
                            }
                        );
                    }
                }
            }
        }
    }
}

fn check_categories(deployment: &Deployment, checker: &mut Checker) {
    for (category, host) in deployment.iter_hosts() {
        if host.roles.is_empty() {
            report!(
                checker,
                Violation::NoRoles {
                    host: host.host.clone(),
                }
            );
        } else if !host.has_role(category) {
            report!(
                checker,
                Violation::WrongCategory {
                    host: host.host.clone(),
                    category: category.descriptor().category,
                    role: category,
                }
            );
        }
    }
}

fn check_required_roles(deployment: &Deployment, checker: &mut Checker) {
    for role in Role::ALL {
        if role == Role::NameServer && !deployment.deploys_dns() {
            continue;
        }
        if deployment.hosts_with_role(role).next().is_none() {
            report!(checker, Violation::MissingRole(role));
        }
    }
}

fn check_identities(deployment: &Deployment, checker: &mut Checker) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for (_, host) in deployment.iter_hosts() {
        *counts.entry(host.host.as_str()).or_default() += 1;
    }
    for (host, count) in counts {
        if count > 1 {
            report!(
                checker,
                Violation::DuplicateHost {
                    host: host.to_string(),
                    count,
                }
            );
        }
    }
}

fn check_host_fields(deployment: &Deployment, checker: &mut Checker) {
    for (_, host) in deployment.iter_hosts() {
        for (field, value) in [("host", &host.host), ("ssh_host", &host.ssh_host)] {
            if !is_valid_hostname(value) {
                report!(
                    checker,
                    Violation::InvalidHostname {
                        host: host.host.clone(),
                        field,
                        value: value.clone(),
                    }
                );
            }
        }
        if !is_valid_username(&host.user) {
            report!(
                checker,
                Violation::InvalidUser {
                    host: host.host.clone(),
                    user: host.user.clone(),
                }
            );
        }
    }
}

fn by_target(deployment: &Deployment) -> BTreeMap<&str, Vec<&HostInstance>> {
    let mut targets: BTreeMap<&str, Vec<&HostInstance>> = BTreeMap::new();
    for (_, host) in deployment.iter_hosts() {
        targets.entry(host.ssh_host.as_str()).or_default().push(host);
    }
    targets
}

fn check_shared_targets(deployment: &Deployment, checker: &mut Checker) {
    for (ssh_host, hosts) in by_target(deployment) {
        let users: BTreeSet<&str> = hosts.iter().map(|h| h.user.as_str()).collect();
        if users.len() > 1 {
            report!(
                checker,
                Violation::ConflictingUsers {
                    ssh_host: ssh_host.to_string(),
                    users: users.into_iter().map(String::from).collect(),
                }
            );
        }
    }
}

fn check_singletons(deployment: &Deployment, checker: &mut Checker) {
    for role in Role::ALL.into_iter().filter(Role::is_singleton) {
        let holders: BTreeSet<&str> = deployment
            .hosts_with_role(role)
            .map(|h| h.host.as_str())
            .collect();
        if holders.len() > 1 {
            report!(
                checker,
                Violation::SingletonRoleShared {
                    role,
                    hosts: holders.into_iter().map(String::from).collect(),
                }
            );
        }
    }
}

fn check_node_isolation(deployment: &Deployment, checker: &mut Checker) {
    let targets = by_target(deployment);
    if targets.len() < 2 {
        return;
    }
    for hosts in targets.values() {
        for host in hosts.iter().filter(|h| h.has_role(Role::Node)) {
            if host.roles.len() > 1 || hosts.len() > 1 {
                report!(
                    checker,
                    Violation::NodeNotStandalone {
                        host: host.host.clone(),
                    }
                );
            }
        }
    }
}

fn check_attributes(deployment: &Deployment, checker: &mut Checker) {
    let mut seen: BTreeMap<&'static str, BTreeMap<String, Vec<String>>> = BTreeMap::new();
    for (_, host) in deployment.iter_hosts() {
        for role in host.roles.iter().copied() {
            for attribute in role.descriptor().required_attributes.iter().copied() {
                match host.attributes.get(attribute).and_then(scalar_text) {
                    Some(value) if !value.is_empty() => {
                        let holders = seen.entry(attribute).or_default().entry(value).or_default();
                        if !holders.contains(&host.host) {
                            holders.push(host.host.clone());
                        }
                    }
                    _ => report!(
                        checker,
                        Violation::MissingAttribute {
                            host: host.host.clone(),
                            role,
                            attribute,
                        }
                    ),
                }
            }
        }
    }
    for (attribute, values) in seen {
        if values.len() > 1 {
            report!(
                checker,
                Violation::InconsistentSharedAttribute {
                    attribute,
                    hosts: values.into_values().flatten().collect(),
                }
            );
        }
    }
}

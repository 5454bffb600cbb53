// components/deployment_model/src/role.rs
//! Roles and their typed descriptors
//!
//! Every role a host can carry is described by a single [`RoleDescriptor`]
//! entry. The descriptor names the category list the role lives in, the
//! component name handed to the provisioner, the variable that exports the
//! role's hostname, the attributes a host must define for the role, and how
//! those attributes are exported to the provisioner.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A functional capability assigned to a host
///
/// Declaration order is dependency precedence: a role may depend on any
/// role declared before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    NameServer,
    DbServer,
    MsgServer,
    Broker,
    Node,
}

impl Role {
    /// All roles in dependency precedence order
    pub const ALL: [Role; 5] = [
        Role::NameServer,
        Role::DbServer,
        Role::MsgServer,
        Role::Broker,
        Role::Node,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::NameServer => "nameserver",
            Role::DbServer => "dbserver",
            Role::MsgServer => "msgserver",
            Role::Broker => "broker",
            Role::Node => "node",
        }
    }

    /// Only nodes may be replicated across hosts
    pub fn is_singleton(&self) -> bool {
        !matches!(self, Role::Node)
    }

    pub fn descriptor(&self) -> &'static RoleDescriptor {
        // ROLE_DESCRIPTORS is laid out in declaration order
        &ROLE_DESCRIPTORS[*self as usize]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown role '{}'", s))
    }
}

/// Static description of a role
#[derive(Debug)]
pub struct RoleDescriptor {
    pub role: Role,

    /// Key of the host list this role is assigned through
    pub category: &'static str,

    /// Component name understood by the provisioner
    pub component: &'static str,

    /// Variable carrying the hostname of the host holding this role
    pub hostname_variable: &'static str,

    /// Attributes a host carrying this role must define
    pub required_attributes: &'static [&'static str],

    /// Host attribute name to provisioner variable name
    pub environment_bindings: &'static [(&'static str, &'static str)],
}

impl RoleDescriptor {
    /// Look up the provisioner variable bound to an attribute
    pub fn binding_for(&self, attribute: &str) -> Option<&'static str> {
        self.environment_bindings
            .iter()
            .find(|(name, _)| *name == attribute)
            .map(|(_, variable)| *variable)
    }
}

const MCOLLECTIVE_BINDINGS: [(&str, &str); 2] = [
    ("mcollective_user", "CONF_MCOLLECTIVE_USER"),
    ("mcollective_password", "CONF_MCOLLECTIVE_PASSWORD"),
];

pub static ROLE_DESCRIPTORS: [RoleDescriptor; 5] = [
    RoleDescriptor {
        role: Role::NameServer,
        category: "NameServers",
        component: "named",
        hostname_variable: "CONF_NAMED_HOSTNAME",
        required_attributes: &[],
        environment_bindings: &[("ip_addr", "CONF_NAMED_IP_ADDR")],
    },
    RoleDescriptor {
        role: Role::DbServer,
        category: "DBServers",
        component: "datastore",
        hostname_variable: "CONF_DATASTORE_HOSTNAME",
        required_attributes: &["mongodb_broker_password"],
        environment_bindings: &[
            ("mongodb_broker_user", "CONF_MONGODB_BROKER_USER"),
            ("mongodb_broker_password", "CONF_MONGODB_BROKER_PASSWORD"),
            ("mongodb_admin_user", "CONF_MONGODB_ADMIN_USER"),
            ("mongodb_admin_password", "CONF_MONGODB_ADMIN_PASSWORD"),
            ("mongodb_replica_name", "CONF_MONGODB_REPLSET"),
            ("mongodb_replica_key", "CONF_MONGODB_KEY"),
        ],
    },
    RoleDescriptor {
        role: Role::MsgServer,
        category: "MsgServers",
        component: "activemq",
        hostname_variable: "CONF_ACTIVEMQ_HOSTNAME",
        required_attributes: &["mcollective_password"],
        environment_bindings: &[
            MCOLLECTIVE_BINDINGS[0],
            MCOLLECTIVE_BINDINGS[1],
            ("msgserver_cluster_password", "CONF_ACTIVEMQ_AMQ_USER_PASSWORD"),
        ],
    },
    RoleDescriptor {
        role: Role::Broker,
        category: "Brokers",
        component: "broker",
        hostname_variable: "CONF_BROKER_HOSTNAME",
        required_attributes: &["mcollective_password", "mongodb_broker_password"],
        environment_bindings: &[
            MCOLLECTIVE_BINDINGS[0],
            MCOLLECTIVE_BINDINGS[1],
            ("mongodb_broker_user", "CONF_MONGODB_BROKER_USER"),
            ("mongodb_broker_password", "CONF_MONGODB_BROKER_PASSWORD"),
            ("openshift_user", "CONF_OPENSHIFT_USER1"),
            ("openshift_password", "CONF_OPENSHIFT_PASSWORD1"),
            ("broker_session_secret", "CONF_BROKER_SESSION_SECRET"),
            ("console_session_secret", "CONF_CONSOLE_SESSION_SECRET"),
        ],
    },
    RoleDescriptor {
        role: Role::Node,
        category: "Nodes",
        component: "node",
        hostname_variable: "CONF_NODE_HOSTNAME",
        required_attributes: &["mcollective_password"],
        environment_bindings: &[
            MCOLLECTIVE_BINDINGS[0],
            MCOLLECTIVE_BINDINGS[1],
            ("ip_addr", "CONF_NODE_IP_ADDR"),
            ("node_profile", "CONF_NODE_PROFILE"),
            ("district", "CONF_DISTRICT_NAME"),
        ],
    },
];

/// Subscription setting to provisioner variables
///
/// One setting may feed several variables (both registration back ends read
/// the same credentials).
pub static SUBSCRIPTION_BINDINGS: &[(&str, &[&str])] = &[
    ("type", &["CONF_INSTALL_METHOD"]),
    ("repos_base", &["CONF_REPOS_BASE"]),
    ("os_repo", &["CONF_RHEL_REPO"]),
    ("jboss_repo_base", &["CONF_JBOSS_REPO_BASE"]),
    ("os_optional_repo", &["CONF_RHEL_OPTIONAL_REPO"]),
    ("rh_username", &["CONF_SM_REG_NAME", "CONF_RHN_REG_NAME"]),
    ("rh_password", &["CONF_SM_REG_PASS", "CONF_RHN_REG_PASS"]),
    ("sm_reg_pool", &["CONF_SM_REG_POOL"]),
    ("sm_reg_pool_rhel", &["CONF_SM_REG_POOL_RHEL"]),
    ("rhn_reg_actkey", &["CONF_RHN_REG_ACTKEY"]),
];

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn descriptors_follow_declaration_order() {
        for role in Role::ALL {
            assert_eq!(role.descriptor().role, role);
        }
    }

    #[rstest]
    #[case("nameserver", Role::NameServer)]
    #[case("dbserver", Role::DbServer)]
    #[case("msgserver", Role::MsgServer)]
    #[case("broker", Role::Broker)]
    #[case("node", Role::Node)]
    fn parses_role_names(#[case] name: &str, #[case] expected: Role) {
        assert_eq!(name.parse::<Role>().unwrap(), expected);
        assert_eq!(expected.to_string(), name);
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!("loadbalancer".parse::<Role>().is_err());
    }

    #[test]
    fn only_node_is_replicable() {
        let replicable: Vec<Role> = Role::ALL.into_iter().filter(|r| !r.is_singleton()).collect();
        assert_eq!(replicable, vec![Role::Node]);
    }

    #[test]
    fn precedence_puts_nameserver_first() {
        let mut roles = vec![Role::Node, Role::Broker, Role::NameServer, Role::DbServer];
        roles.sort();
        assert_eq!(
            roles,
            vec![Role::NameServer, Role::DbServer, Role::Broker, Role::Node]
        );
    }

    #[test]
    fn binding_lookup_is_explicit() {
        let broker = Role::Broker.descriptor();
        assert_eq!(
            broker.binding_for("mcollective_password"),
            Some("CONF_MCOLLECTIVE_PASSWORD")
        );
        assert_eq!(broker.binding_for("node_profile"), None);
    }
}

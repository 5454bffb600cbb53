// components/orchestrator/src/params.rs
//! Parameters handed to every provisioner invocation
//!
//! Hostnames of dependency roles are looked up in the deployment, never
//! stored twice. Subscription settings can be overridden from the
//! environment, which is read once when the run starts.

use deploy_planner::Machine;
use deployment_model::{Deployment, InstallStep, Role, Subscription, SUBSCRIPTION_BINDINGS};
use remote_exec::ParamBag;
use std::collections::BTreeMap;

const OVERRIDE_PREFIX: &str = "FLEET_DEPLOY_";

/// Subscription values supplied outside the configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionOverrides(BTreeMap<String, String>);

impl SubscriptionOverrides {
    /// Pick `FLEET_DEPLOY_<SETTING>` variables out of the process environment
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let wanted: BTreeMap<String, &str> = SUBSCRIPTION_BINDINGS
            .iter()
            .map(|(setting, _)| (format!("{}{}", OVERRIDE_PREFIX, setting.to_ascii_uppercase()), *setting))
            .collect();
        Self(
            vars.into_iter()
                .filter_map(|(name, value)| wanted.get(&name).map(|setting| (setting.to_string(), value)))
                .collect(),
        )
    }

    pub fn get(&self, setting: &str) -> Option<&str> {
        self.0.get(setting).map(String::as_str)
    }
}

/// Parameters shared by every machine in a run
pub fn global_params(
    deployment: &Deployment,
    subscription: &Subscription,
    overrides: &SubscriptionOverrides,
    nameserver_ip: Option<&str>,
) -> ParamBag {
    let mut params: BTreeMap<String, String> = BTreeMap::new();
    params.insert("CONF_DOMAIN".to_string(), deployment.dns.app_domain.clone());

    for role in Role::ALL.into_iter().filter(|r| *r != Role::Node) {
        if let Some(holder) = deployment.hosts_with_role(role).next() {
            params.insert(role.descriptor().hostname_variable.to_string(), holder.host.clone());
        }
    }
    if let Some(ip) = nameserver_ip {
        params.insert("CONF_NAMED_IP_ADDR".to_string(), ip.to_string());
    }

    for (setting, variables) in SUBSCRIPTION_BINDINGS {
        let value = overrides
            .get(setting)
            .map(str::to_string)
            .or_else(|| subscription.setting(setting));
        if let Some(value) = value {
            for variable in variables.iter() {
                params.insert(variable.to_string(), value.clone());
            }
        }
    }

    params.into_iter().collect()
}

/// Parameters for one step on one machine
pub fn machine_params(
    global: &ParamBag,
    deployment: &Deployment,
    machine: &Machine,
    step: InstallStep,
) -> ParamBag {
    let mut params: BTreeMap<String, String> = BTreeMap::new();
    params.insert("CONF_INSTALL_STEP".to_string(), step.to_string());

    let components: Vec<&str> = machine.roles.iter().map(|r| r.descriptor().component).collect();
    params.insert("CONF_INSTALL_COMPONENTS".to_string(), components.join(","));

    for member in machine.members.iter().filter_map(|m| deployment.find(m)) {
        if member.has_role(Role::Node) {
            params.insert(Role::Node.descriptor().hostname_variable.to_string(), member.host.clone());
        }
        for role in member.roles.iter() {
            for (attribute, variable) in role.descriptor().environment_bindings {
                if let Some(value) = member.attribute(attribute) {
                    params.insert(variable.to_string(), value);
                }
            }
        }
    }

    let local: ParamBag = params.into_iter().collect();
    global.merged(&local)
}

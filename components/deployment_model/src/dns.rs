// components/deployment_model/src/dns.rs
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;
use std::collections::BTreeMap;

fn default_app_domain() -> String {
    "example.com".to_string()
}

/// DNS and domain settings of the deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Domain applications are published under
    #[serde(default = "default_app_domain")]
    pub app_domain: String,

    /// Domain the platform hosts themselves live in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_domain: Option<String>,

    /// Register platform hosts with the deployed nameserver
    #[serde(default, skip_serializing_if = "Option::is_none", with = "yes_no")]
    pub register_components: Option<bool>,

    /// Deploy a nameserver as part of the platform
    ///
    /// When unset, DNS is deployed exactly when a nameserver is designated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_dns: Option<bool>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            app_domain: default_app_domain(),
            component_domain: None,
            register_components: None,
            deploy_dns: None,
            extra: BTreeMap::new(),
        }
    }
}

impl DnsConfig {
    pub fn registers_components(&self) -> bool {
        self.register_components.unwrap_or(false)
    }
}

/// Existing configuration files write booleans as `yes`/`no`
mod yes_no {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(true) => serializer.serialize_str("yes"),
            Some(false) => serializer.serialize_str("no"),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
        let flag = Option::<Flag>::deserialize(deserializer)?;
        match flag {
            None => Ok(None),
            Some(Flag::Bool(b)) => Ok(Some(b)),
            Some(Flag::Text(text)) => match text.to_ascii_lowercase().as_str() {
                "yes" | "y" | "true" => Ok(Some(true)),
                "no" | "n" | "false" => Ok(Some(false)),
                other => Err(serde::de::Error::custom(format!(
                    "expected yes or no, found '{}'",
                    other
                ))),
            },
        }
    }
}

// components/deployment_model/src/config.rs
//! Persisted configuration document
//!
//! Only the `Deployment` and `Subscription` sections are interpreted. Every
//! other key, at every level, is carried through a load and save untouched.

use crate::deployment::Deployment;
use crate::error::ConfigError;
use crate::host::scalar_text;
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Repository and registration settings handed to the provisioner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(flatten)]
    pub settings: BTreeMap<String, Value>,
}

impl Subscription {
    pub fn setting(&self, name: &str) -> Option<String> {
        scalar_text(self.settings.get(name)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(rename = "Deployment", default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<Deployment>,

    #[serde(rename = "Subscription", default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ConfigFile {
    pub fn from_yaml(path: &Path, text: &str) -> Result<Self, ConfigError> {
        serde_yaml_ng::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml_ng::to_string(self).map_err(ConfigError::Serialize)
    }
}

/// The configuration document bound to the file it came from
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    document: ConfigFile,
}

impl ConfigStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::read(&path, e))?;
        let document = ConfigFile::from_yaml(&path, &text)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(Self { path, document })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &ConfigFile {
        &self.document
    }

    pub fn deployment(&self) -> Result<&Deployment, ConfigError> {
        self.document
            .deployment
            .as_ref()
            .ok_or_else(|| ConfigError::MissingDeployment {
                path: self.path.clone(),
            })
    }

    pub fn subscription(&self) -> Subscription {
        self.document.subscription.clone().unwrap_or_default()
    }

    /// Replace the deployment section and write the document out
    pub fn save_deployment(&mut self, deployment: &Deployment) -> Result<(), ConfigError> {
        self.document.deployment = Some(deployment.clone());
        self.save()
    }

    /// Write the document atomically
    ///
    /// The new contents go to a temporary file in the same directory which
    /// is then renamed over the original, so a crash never leaves a
    /// half-written configuration behind.
    pub fn save(&self) -> Result<(), ConfigError> {
        let yaml = self.document.to_yaml()?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ConfigError::write(&self.path, e))?;
        tmp.write_all(yaml.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| ConfigError::write(&self.path, e))?;
        tmp.persist(&self.path)
            .map_err(|e| ConfigError::write(&self.path, e.error))?;
        debug!("Saved configuration to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;
    use crate::state::{InstallState, InstallStep};
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
Vendor: example
Subscription:
  type: yum
  repos_base: https://mirror.example.com/repos
  rh_username: operator
Deployment:
  Brokers:
    - host: broker.example.com
      ssh_host: localhost
      user: root
      roles: [broker, msgserver, dbserver]
      status: completed
      mcollective_password: mcpass
      mongodb_broker_password: dbpass
  Nodes:
    - host: node1.example.com
      ssh_host: 10.0.0.2
      user: admin
      roles: [node]
      status: new
      mcollective_password: mcpass
      district: default-small
  DNS:
    app_domain: apps.example.com
    register_components: 'no'
    dns_extra: kept
  Districts:
    - name: default-small
"#;

    fn write_sample(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("deployment.yml");
        std::fs::write(&path, SAMPLE).unwrap();
        path
    }

    #[test]
    fn parses_sections() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::open(write_sample(&dir)).unwrap();

        let deployment = store.deployment().unwrap();
        assert_eq!(deployment.brokers[0].install_state, InstallState::Completed);
        assert!(deployment.brokers[0].has_role(Role::DbServer));
        assert_eq!(deployment.dns.app_domain, "apps.example.com");
        assert_eq!(
            store.subscription().setting("repos_base").as_deref(),
            Some("https://mirror.example.com/repos")
        );
    }

    #[test]
    fn unknown_fields_survive_a_save() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir);
        let mut store = ConfigStore::open(&path).unwrap();

        let mut deployment = store.deployment().unwrap().clone();
        deployment
            .record_step("node1.example.com", InstallState::Prepared, InstallStep::Prepare)
            .unwrap();
        store.save_deployment(&deployment).unwrap();

        let reloaded = ConfigStore::open(&path).unwrap();
        let document = reloaded.document();
        assert!(document.extra.contains_key("Vendor"));
        let reloaded_deployment = reloaded.deployment().unwrap();
        assert!(reloaded_deployment.extra.contains_key("Districts"));
        assert!(reloaded_deployment.dns.extra.contains_key("dns_extra"));
        assert_eq!(
            reloaded_deployment.nodes[0].attribute("district").as_deref(),
            Some("default-small")
        );
        assert_eq!(reloaded_deployment, &deployment);
    }

    #[test]
    fn round_trip_is_lossless() {
        let path = Path::new("deployment.yml");
        let document = ConfigFile::from_yaml(path, SAMPLE).unwrap();
        let again = ConfigFile::from_yaml(path, &document.to_yaml().unwrap()).unwrap();
        assert_eq!(again, document);
    }

    #[test]
    fn missing_deployment_section_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.yml");
        std::fs::write(&path, "Subscription:\n  type: yum\n").unwrap();

        let store = ConfigStore::open(&path).unwrap();
        assert_matches!(store.deployment(), Err(ConfigError::MissingDeployment { .. }));
    }

    #[test]
    fn unreadable_file_reports_path() {
        let result = ConfigStore::open("/nonexistent/fleet/deployment.yml");
        assert_matches!(result, Err(ConfigError::Read { path, .. }) if path.ends_with("deployment.yml"));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yml");
        std::fs::write(&path, "Deployment: [unterminated\n").unwrap();

        assert_matches!(ConfigStore::open(&path), Err(ConfigError::Parse { .. }));
    }
}

//! Configuration schema for depot
//!
//! Every section is optional so a config file only needs what it changes.

use depot_core::config::ConfigProperties;
use depot_core::repository::{
    CHECKSUM_POLICY_FAIL, CHECKSUM_POLICY_IGNORE, CHECKSUM_POLICY_WARN, UPDATE_POLICY_ALWAYS,
    UPDATE_POLICY_DAILY, UPDATE_POLICY_INTERVAL, UPDATE_POLICY_NEVER,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

/// Main configuration structure for depot
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DepotConfig {
    /// Local store directory; defaults to the platform data dir
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_store: Option<PathBuf>,

    /// Only `file:` repositories are contacted
    pub offline: bool,

    /// Overrides the checksum policy of every repository
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_policy: Option<String>,

    /// Overrides the update policy of every repository
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_policy: Option<String>,

    /// Config properties, e.g. `"depot.priority.FileTransporter" = 10`
    #[serde(skip_serializing_if = "ConfigProperties::is_empty")]
    pub properties: ConfigProperties,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub user_properties: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<RepositoryConfig>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mirrors: Vec<MirrorConfig>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub proxies: Vec<ProxyConfig>,

    /// Credentials by repository id
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<ServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub id: String,
    pub url: String,
    #[serde(default = "default_layout")]
    pub layout: String,
    #[serde(default)]
    pub releases: PolicyConfig,
    #[serde(default)]
    pub snapshots: PolicyConfig,
}

fn default_layout() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub enabled: bool,
    pub update_policy: String,
    pub checksum_policy: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            update_policy: UPDATE_POLICY_DAILY.to_string(),
            checksum_policy: CHECKSUM_POLICY_WARN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    pub id: String,
    pub url: String,
    /// Layout of the mirror; empty keeps the mirrored repository's layout
    #[serde(default)]
    pub layout: String,
    /// Repository ids this mirror serves: `*`, `external:*`, `a,b`, `*,!c`
    pub mirror_of: String,
    #[serde(default)]
    pub mirror_of_layouts: String,
    #[serde(default)]
    pub repository_manager: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_protocol")]
    pub protocol: String,
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// `|` or `,` separated host patterns that bypass the proxy
    #[serde(default)]
    pub non_proxy_hosts: String,
}

fn default_proxy_protocol() -> String {
    "http".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl DepotConfig {
    /// Validate the configuration for common errors
    ///
    /// Returns Ok(()) if valid, or Err with a list of error messages
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        check_policy("checksum_policy", self.checksum_policy.as_deref(), &mut errors);
        check_policy("update_policy", self.update_policy.as_deref(), &mut errors);

        let mut ids = HashSet::new();
        for repository in &self.repositories {
            check_entry("repository", &repository.id, &repository.url, &mut ids, &mut errors);
            for (kind, policy) in [("releases", &repository.releases), ("snapshots", &repository.snapshots)] {
                let field = format!("repository '{}' {kind}", repository.id);
                check_policy(&format!("{field} checksum_policy"), Some(&policy.checksum_policy), &mut errors);
                check_policy(&format!("{field} update_policy"), Some(&policy.update_policy), &mut errors);
            }
        }

        let mut mirror_ids = HashSet::new();
        for mirror in &self.mirrors {
            check_entry("mirror", &mirror.id, &mirror.url, &mut mirror_ids, &mut errors);
            if mirror.mirror_of.trim().is_empty() {
                errors.push(format!("Mirror '{}' has an empty mirror_of", mirror.id));
            }
        }

        for proxy in &self.proxies {
            if proxy.host.trim().is_empty() {
                errors.push(format!("{} proxy has an empty host", proxy.protocol));
            }
            if proxy.port == 0 {
                errors.push(format!("{} proxy {} has port 0", proxy.protocol, proxy.host));
            }
        }

        let mut server_ids = HashSet::new();
        for server in &self.servers {
            if server.id.trim().is_empty() {
                errors.push("Server entry has an empty id".to_string());
            } else if !server_ids.insert(server.id.as_str()) {
                errors.push(format!("Duplicate server id '{}'", server.id));
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

fn check_entry<'a>(kind: &str, id: &'a str, url: &str, ids: &mut HashSet<&'a str>, errors: &mut Vec<String>) {
    if id.trim().is_empty() {
        errors.push(format!("A {kind} has an empty id"));
    } else if !ids.insert(id) {
        errors.push(format!("Duplicate {kind} id '{id}'"));
    }
    if url.trim().is_empty() {
        errors.push(format!("The {kind} '{id}' has an empty url"));
    }
}

fn check_policy(field: &str, value: Option<&str>, errors: &mut Vec<String>) {
    let Some(value) = value else {
        return;
    };
    let valid = if field.ends_with("checksum_policy") {
        [CHECKSUM_POLICY_FAIL, CHECKSUM_POLICY_WARN, CHECKSUM_POLICY_IGNORE].contains(&value)
    } else {
        [UPDATE_POLICY_ALWAYS, UPDATE_POLICY_DAILY, UPDATE_POLICY_NEVER].contains(&value)
            || value
                .strip_prefix(UPDATE_POLICY_INTERVAL)
                .and_then(|rest| rest.strip_prefix(':'))
                .is_some_and(|minutes| minutes.trim().parse::<u64>().is_ok())
    };
    if !valid {
        errors.push(format!("Invalid {field} '{value}'"));
    }
}

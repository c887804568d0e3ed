//! Declaration of the three hierarchies and the role grants, and its file-backed provider.
//!
//! Declarations are TOML; a file with a `.json` extension holds the same structure in JSON.
//!
//! ```toml
//! [[site_map]]
//! key = "admin"
//! title = "Administration"
//! url = "/admin"
//!
//! [[site_map]]
//! key = "admin.users"
//! parent = "admin"
//! title = "Users"
//! url = "/admin/users"
//! required_permission = "users.manage"
//!
//! [roles]
//! admin = ["users.manage"]
//! ```
use crate::{
    access::InMemoryRoleProvider,
    actionmap::SharedActionMap,
    error::SitegateError,
    permission::SharedPermissionMap,
    properties::{
        ActionMapPayload, Attributes, NodePayload, NodeSpec, PermissionPayload, SiteMapPayload,
    },
    registry::{Registry, SharedRegistry},
    sitemap::SharedSiteMap,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

/// One declared node. Entries without a parent become roots. `url` and `required_permission`
/// only mean something for site-map entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_permission: Option<String>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl NodeEntry {
    fn spec<P: NodePayload>(&self, payload: P) -> NodeSpec<P> {
        NodeSpec {
            title: self.title.clone(),
            description: self.description.clone(),
            attributes: self.attributes.clone(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub site_map: Vec<NodeEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_map: Vec<NodeEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<NodeEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub roles: BTreeMap<String, Vec<String>>,
}

impl FromStr for SecurityConfig {
    type Err = SitegateError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(text)?)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

impl SecurityConfig {
    /// Reads a declaration file, as JSON when the extension is `.json` and as TOML otherwise.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SitegateError> {
        let path = path.as_ref();
        tracing::info!("Loading security declaration from {:?}", path);
        let text = read_to_string(path)?;
        if is_json(path) {
            SecurityConfig::from_json_str(&text)
        } else {
            text.parse()
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, SitegateError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> Result<String, SitegateError> {
        Ok(toml::to_string(self)?)
    }

    pub fn to_json_string(&self) -> Result<String, SitegateError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serialises in the format [SecurityConfig::from_path] reads back from `path`.
    pub fn to_string_for(&self, path: &Path) -> Result<String, SitegateError> {
        if is_json(path) {
            self.to_json_string()
        } else {
            self.to_toml_string()
        }
    }

    /// Populates fresh registries and a role provider. Entries are inserted in file order, so a
    /// parent has to be declared before its children.
    pub fn build(&self) -> Result<Security, SitegateError> {
        let site_map = populate(&self.site_map, |entry| SiteMapPayload {
            url: entry.url.clone(),
            required_permission: entry.required_permission.clone(),
        })?;
        let action_map = populate(&self.action_map, |_| ActionMapPayload)?;
        let permissions = populate(&self.permissions, |_| PermissionPayload)?;

        let roles = InMemoryRoleProvider::new();
        for (role, granted) in &self.roles {
            roles.grant(role.as_str(), granted.iter().map(String::as_str));
        }

        tracing::info!(
            "Built security declaration: {} site map, {} action map, {} permission node(s), {} role(s)",
            site_map.node_count(),
            action_map.node_count(),
            permissions.node_count(),
            self.roles.len()
        );
        Ok(Security {
            site_map: SharedRegistry::from(site_map),
            action_map: SharedRegistry::from(action_map),
            permissions: SharedRegistry::from(permissions),
            roles: Arc::new(roles),
        })
    }

    /// The declaration that rebuilds `security` as it currently stands: every attached node in
    /// pre-order plus the current role grants.
    pub fn capture(security: &Security) -> Result<Self, SitegateError> {
        Ok(SecurityConfig {
            site_map: entries(&security.site_map.read(), |payload, entry| {
                entry.url = payload.url.clone();
                entry.required_permission = payload.required_permission.clone();
            })?,
            action_map: entries(&security.action_map.read(), |_, _| {})?,
            permissions: entries(&security.permissions.read(), |_, _| {})?,
            roles: security.roles.grants(),
        })
    }
}

fn populate<P, F>(entries: &[NodeEntry], payload: F) -> Result<Registry<P>, SitegateError>
where
    P: NodePayload,
    F: Fn(&NodeEntry) -> P,
{
    let mut registry = Registry::new();
    for entry in entries {
        let spec = entry.spec(payload(entry));
        match entry.parent.as_deref() {
            Some(parent) => registry.add_node(parent, &entry.key, spec)?,
            None => registry.add_root_node(&entry.key, spec)?,
        };
    }
    Ok(registry)
}

fn entries<P, F>(registry: &Registry<P>, fill: F) -> Result<Vec<NodeEntry>, SitegateError>
where
    P: NodePayload,
    F: Fn(&P, &mut NodeEntry),
{
    let mut entries = Vec::new();
    for (_, node) in registry.traverse() {
        let parent = match node.parent() {
            Some(parent) => Some(registry.node(parent)?.key().to_string()),
            None => None,
        };
        let mut entry = NodeEntry {
            key: node.key().to_string(),
            parent,
            title: node.title().map(str::to_string),
            description: node.description().map(str::to_string),
            attributes: node.attributes().clone(),
            ..Default::default()
        };
        fill(node.payload(), &mut entry);
        entries.push(entry);
    }
    Ok(entries)
}

/// The wired-up authorization state of one application.
#[derive(Debug, Clone)]
pub struct Security {
    pub site_map: SharedSiteMap,
    pub action_map: SharedActionMap,
    pub permissions: SharedPermissionMap,
    pub roles: Arc<InMemoryRoleProvider>,
}

pub trait ConfigProvider: Send + Sync {
    fn get_config(&self) -> Result<SecurityConfig, SitegateError>;
    fn set_config(&self, config: &SecurityConfig) -> Result<(), SitegateError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn get_config(&self) -> Result<SecurityConfig, SitegateError> {
        tracing::debug!("Attempting to read security declaration from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, returning an empty declaration.");
            return Ok(SecurityConfig::default());
        }
        SecurityConfig::from_path(&self.path)
    }

    fn set_config(&self, config: &SecurityConfig) -> Result<(), SitegateError> {
        tracing::debug!("Attempting to write security declaration to: {:?}", &self.path);
        write(&self.path, config.to_string_for(&self.path)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::init_logging;
    use tempfile::tempdir;

    const DECLARATION: &str = r#"
[[site_map]]
key = "admin"
title = "Administration"
url = "/admin"

[[site_map]]
key = "admin.users"
parent = "admin"
title = "Users"
url = "/admin/users"
required_permission = "users.manage"
attributes = { icon = "people" }

[[action_map]]
key = "orders"

[[action_map]]
key = "orders.refund"
parent = "orders"
description = "Refund an order"

[[permissions]]
key = "users"
title = "Users"

[[permissions]]
key = "users.manage"
parent = "users"

[roles]
admin = ["users.manage", "orders.refund"]
viewer = []
"#;

    #[test]
    fn builds_every_hierarchy() {
        init_logging();
        let security: Security = DECLARATION
            .parse::<SecurityConfig>()
            .unwrap()
            .build()
            .unwrap();

        let users = security.site_map.find_node("admin.users").unwrap().unwrap();
        assert_eq!(users.payload.url.as_deref(), Some("/admin/users"));
        assert_eq!(users.required_permission(), Some("users.manage"));
        assert_eq!(users.attributes.get("icon"), Some("people"));

        let refund = security.action_map.find_node("orders.refund").unwrap().unwrap();
        assert_eq!(refund.description.as_deref(), Some("Refund an order"));
        assert!(refund.parent.is_some());

        assert_eq!(
            security
                .permissions
                .read()
                .permission_closure("users")
                .unwrap()
                .len(),
            2
        );
        assert_eq!(security.roles.roles(), vec!["admin", "viewer"]);
    }

    #[test]
    fn parents_must_come_first() {
        let text = r#"
[[site_map]]
key = "admin.users"
parent = "admin"

[[site_map]]
key = "admin"
"#;
        let result = text.parse::<SecurityConfig>().unwrap().build();
        assert!(matches!(result, Err(SitegateError::NotFound(_))));
    }

    #[test]
    fn malformed_toml_is_a_serialization_error() {
        let result = "[[site_map]]\ntitle = 3".parse::<SecurityConfig>();
        assert!(matches!(result, Err(SitegateError::Serialization(_))));
    }

    #[test]
    fn capture_rebuilds_the_same_declaration() {
        let config: SecurityConfig = DECLARATION.parse().unwrap();
        let security = config.build().unwrap();
        assert_eq!(SecurityConfig::capture(&security).unwrap(), config);
    }

    #[test]
    fn provider_round_trips_through_disk() {
        init_logging();
        let dir = tempdir().unwrap();
        let provider = TomlConfigProvider::new(dir.path().join("security.toml"));

        assert_eq!(provider.get_config().unwrap(), SecurityConfig::default());

        let config: SecurityConfig = DECLARATION.parse().unwrap();
        provider.set_config(&config).unwrap();
        assert_eq!(provider.get_config().unwrap(), config);
    }

    #[test]
    fn json_declarations_load_by_extension() {
        init_logging();
        let dir = tempdir().unwrap();
        let config: SecurityConfig = DECLARATION.parse().unwrap();

        let path = dir.path().join("security.json");
        std::fs::write(&path, config.to_json_string().unwrap()).unwrap();
        let loaded = SecurityConfig::from_path(&path).unwrap();
        assert_eq!(loaded, config);
        let users = loaded.build().unwrap().site_map.find_node("admin.users").unwrap();
        assert_eq!(users.unwrap().attributes.get("icon"), Some("people"));

        // The same text under a TOML name is not valid TOML.
        let misnamed = dir.path().join("security.toml");
        std::fs::write(&misnamed, config.to_json_string().unwrap()).unwrap();
        assert!(matches!(
            SecurityConfig::from_path(&misnamed),
            Err(SitegateError::Serialization(_))
        ));
    }

    #[test]
    fn json_provider_writes_json() {
        let dir = tempdir().unwrap();
        let provider = TomlConfigProvider::new(dir.path().join("security.json"));
        let config = SecurityConfig::from_json_str(
            r#"{"site_map": [{"key": "home", "url": "/"}], "roles": {"guest": []}}"#,
        )
        .unwrap();
        provider.set_config(&config).unwrap();

        let written = std::fs::read_to_string(provider.path()).unwrap();
        assert!(written.trim_start().starts_with('{'));
        assert_eq!(provider.get_config().unwrap(), config);
        assert!(matches!(
            SecurityConfig::from_json_str("{\"site_map\": 3}"),
            Err(SitegateError::Serialization(_))
        ));
    }

    #[test]
    fn missing_file_via_from_path_is_not_found() {
        let dir = tempdir().unwrap();
        let result = SecurityConfig::from_path(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(SitegateError::NotFound(_))));
    }
}

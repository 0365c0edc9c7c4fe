//! Vault data models and types
//!
//! This module defines the management-plane representation of a vault:
//! vault properties, SKU and the access-policy list.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Key Vault resource as returned by the management plane
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vault {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    pub properties: VaultProperties,
}

impl Vault {
    /// Server-assigned data-plane URI, once known.
    pub fn vault_uri(&self) -> Option<&str> {
        self.properties.vault_uri.as_deref()
    }

    /// Parameters that write this definition back unchanged.
    pub fn to_update_parameters(&self) -> VaultCreateOrUpdateParameters {
        VaultCreateOrUpdateParameters {
            location: self.location.clone(),
            properties: self.properties.clone(),
            tags: Some(self.tags.clone()),
        }
    }
}

/// Vault properties
///
/// Properties this crate does not model are kept in `additional` so that a
/// fetched definition can be written back without dropping them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VaultProperties {
    pub tenant_id: String,
    pub sku: Sku,
    #[serde(default)]
    pub access_policies: Vec<AccessPolicyEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_uri: Option<String>,
    #[serde(default)]
    pub enabled_for_deployment: bool,
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

impl VaultProperties {
    pub fn new<S: Into<String>>(tenant_id: S, access_policies: Vec<AccessPolicyEntry>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            sku: Sku::standard(),
            access_policies,
            vault_uri: None,
            enabled_for_deployment: false,
            additional: Map::new(),
        }
    }

    /// Append an entry; existing entries are left untouched.
    pub fn append_access_policy(&mut self, entry: AccessPolicyEntry) {
        self.access_policies.push(entry);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sku {
    #[serde(default = "default_sku_family")]
    pub family: String,
    pub name: String,
}

fn default_sku_family() -> String {
    "A".to_string()
}

impl Sku {
    pub fn standard() -> Self {
        Self {
            family: default_sku_family(),
            name: "standard".to_string(),
        }
    }
}

/// Grant of key/secret capabilities to one identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicyEntry {
    pub tenant_id: String,
    pub object_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    pub permissions: Permissions,
}

impl AccessPolicyEntry {
    pub fn new(
        tenant_id: String,
        object_id: String,
        application_id: Option<String>,
        access_level: AccessLevel,
    ) -> Self {
        Self {
            tenant_id,
            object_id,
            application_id,
            permissions: access_level.permissions(),
        }
    }
}

/// Permissions within an access policy
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Permissions {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub secrets: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub storage: Vec<String>,
}

/// Named permission sets granted by the provisioning run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccessLevel {
    /// Initial grant for the provisioning identity
    Owner,
    /// Later grant for the second principal
    Operator,
}

impl AccessLevel {
    pub fn to_key_permissions(&self) -> Vec<String> {
        let keys: &[&str] = match self {
            AccessLevel::Owner => &[
                "get", "create", "delete", "list", "update", "import", "backup", "restore",
            ],
            AccessLevel::Operator => &["get", "list", "import"],
        };
        keys.iter().map(|p| p.to_string()).collect()
    }

    pub fn to_secret_permissions(&self) -> Vec<String> {
        vec!["all".to_string()]
    }

    pub fn permissions(&self) -> Permissions {
        Permissions {
            keys: self.to_key_permissions(),
            secrets: self.to_secret_permissions(),
            certificates: Vec::new(),
            storage: Vec::new(),
        }
    }
}

/// Body of a vault create-or-update request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VaultCreateOrUpdateParameters {
    pub location: String,
    pub properties: VaultProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
}

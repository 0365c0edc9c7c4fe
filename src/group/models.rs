//! Resource group data models

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body of a resource group create-or-update request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceGroupParameters {
    pub location: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,
}

impl ResourceGroupParameters {
    pub fn new<S: Into<String>>(location: S) -> Self {
        Self {
            location: location.into(),
            tags: HashMap::new(),
        }
    }
}

/// Resource group as returned by the management plane
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub properties: Option<ResourceGroupProperties>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupProperties {
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

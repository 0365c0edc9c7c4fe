//! Vault data-plane models: keys, secrets and their attributes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// Validity window and status shared by keys and secrets
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Attributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub nbf: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub exp: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated: Option<DateTime<Utc>>,
}

impl Attributes {
    pub fn validity(not_before: DateTime<Utc>, expires: DateTime<Utc>) -> Self {
        Self {
            nbf: Some(not_before),
            exp: Some(expires),
            ..Self::default()
        }
    }
}

/// Body of a key creation request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateKeyParameters {
    pub kty: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_ops: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
}

/// Public part of a key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonWebKey {
    #[serde(default)]
    pub kid: Option<String>,
    pub kty: String,
    #[serde(default)]
    pub key_ops: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyBundle {
    pub key: JsonWebKey,
    #[serde(default)]
    pub attributes: Option<Attributes>,
}

/// Entry of a key listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyItem {
    pub kid: String,
    #[serde(default)]
    pub attributes: Option<Attributes>,
}

impl KeyItem {
    pub fn name(&self) -> String {
        object_name(&self.kid, "keys")
    }
}

/// Body of a secret set request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SetSecretParameters {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretBundle {
    pub id: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub attributes: Option<Attributes>,
}

/// Entry of a secret listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretItem {
    pub id: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub attributes: Option<Attributes>,
}

impl SecretItem {
    pub fn name(&self) -> String {
        object_name(&self.id, "secrets")
    }
}

/// One page of a data-plane listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "nextLink", default)]
    pub next_link: Option<String>,
}

/// Row of the run summary table
#[derive(Debug, Clone, Tabled)]
pub struct VaultObjectRow {
    #[tabled(rename = "Kind")]
    pub kind: &'static str,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Expires")]
    pub expires: String,
}

impl From<&KeyItem> for VaultObjectRow {
    fn from(item: &KeyItem) -> Self {
        Self {
            kind: "key",
            name: item.name(),
            expires: format_expiry(item.attributes.as_ref()),
        }
    }
}

impl From<&SecretItem> for VaultObjectRow {
    fn from(item: &SecretItem) -> Self {
        Self {
            kind: "secret",
            name: item.name(),
            expires: format_expiry(item.attributes.as_ref()),
        }
    }
}

fn format_expiry(attributes: Option<&Attributes>) -> String {
    attributes
        .and_then(|a| a.exp)
        .map(|exp| exp.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Object name from an identifier like `https://kv.vault.azure.net/keys/name/version`.
fn object_name(id: &str, collection: &str) -> String {
    let path = match url::Url::parse(id) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => id.to_string(),
    };
    let segments: Vec<&str> = path.split('/').filter(|seg| !seg.is_empty()).collect();

    segments
        .iter()
        .position(|seg| *seg == collection)
        .and_then(|i| segments.get(i + 1))
        .map(|name| name.to_string())
        .unwrap_or_else(|| id.to_string())
}

//! Everything a run creates, decided before the first remote call

use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

use crate::config::settings::{RunSettings, DEFAULT_LOCATION, DEFAULT_SETTLE_DELAY};
use crate::dataplane::models::{Attributes, CreateKeyParameters, SetSecretParameters};
use crate::utils::helpers::generate_random_id;

pub const RESOURCE_GROUP_PREFIX: &str = "testrg";
pub const VAULT_PREFIX: &str = "testkv";

#[derive(Debug, Clone, PartialEq)]
pub struct KeySpec {
    pub name: String,
    pub kty: String,
    pub key_ops: Vec<String>,
    pub not_before: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl KeySpec {
    pub fn parameters(&self) -> CreateKeyParameters {
        CreateKeyParameters {
            kty: self.kty.clone(),
            key_ops: self.key_ops.clone(),
            attributes: Some(Attributes::validity(self.not_before, self.expires)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecretSpec {
    pub name: String,
    pub value: String,
    pub content_type: String,
    pub not_before: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl SecretSpec {
    pub fn parameters(&self) -> SetSecretParameters {
        SetSecretParameters {
            value: self.value.clone(),
            content_type: Some(self.content_type.clone()),
            attributes: Some(Attributes::validity(self.not_before, self.expires)),
        }
    }
}

/// Names, location, timing and payloads of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowPlan {
    pub resource_group: String,
    pub vault_name: String,
    pub location: String,
    pub settle_delay: Duration,
    pub key: KeySpec,
    pub secret: SecretSpec,
}

fn validity_window() -> (DateTime<Utc>, DateTime<Utc>) {
    (
        Utc.with_ymd_and_hms(2016, 1, 1, 8, 0, 0)
            .single()
            .unwrap_or_else(Utc::now),
        Utc.with_ymd_and_hms(2050, 2, 2, 8, 0, 0)
            .single()
            .unwrap_or_else(Utc::now),
    )
}

impl WorkflowPlan {
    /// Plan with explicit resource names and the default payloads.
    pub fn new<G: Into<String>, V: Into<String>>(resource_group: G, vault_name: V) -> Self {
        let (not_before, expires) = validity_window();
        Self {
            resource_group: resource_group.into(),
            vault_name: vault_name.into(),
            location: DEFAULT_LOCATION.to_string(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            key: KeySpec {
                name: "testkeyrandom99".to_string(),
                kty: "RSA".to_string(),
                key_ops: ["encrypt", "decrypt", "sign", "verify", "wrapKey", "unwrapKey"]
                    .iter()
                    .map(|op| op.to_string())
                    .collect(),
                not_before,
                expires,
            },
            secret: SecretSpec {
                name: "mysecret".to_string(),
                value: "my shared secret".to_string(),
                content_type: "test secret".to_string(),
                not_before,
                expires,
            },
        }
    }

    /// Plan with freshly generated resource names.
    pub fn generate(settings: &RunSettings) -> Self {
        Self::new(
            generate_random_id(RESOURCE_GROUP_PREFIX),
            generate_random_id(VAULT_PREFIX),
        )
        .with_location(&settings.location)
        .with_settle_delay(settings.settle_delay)
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = location.to_string();
        self
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }
}

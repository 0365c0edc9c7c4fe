//! Configuration settings management
//!
//! The workflow configuration is built once at process entry from the
//! environment and passed by reference to the orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use zeroize::Zeroizing;

use crate::arm::DEFAULT_MANAGEMENT_ENDPOINT;
use crate::auth::provider::DEFAULT_LOGIN_ENDPOINT;
use crate::error::{ProvisionError, Result};

pub const ENV_CLIENT_ID: &str = "CLIENT_ID";
pub const ENV_DOMAIN: &str = "DOMAIN";
pub const ENV_APPLICATION_SECRET: &str = "APPLICATION_SECRET";
pub const ENV_SUBSCRIPTION_ID: &str = "AZURE_SUBSCRIPTION_ID";
pub const ENV_OBJECT_ID: &str = "OBJECT_ID";
pub const ENV_OBJECT_ID_KEYVAULT_OPERATIONS: &str = "OBJECT_ID_KEYVAULT_OPERATIONS";
pub const ENV_SP_KEYVAULT_OPERATIONS: &str = "SP_KEYVAULT_OPERATIONS";

/// Default wait between vault creation and the first data-plane call.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(5000);
pub const DEFAULT_LOCATION: &str = "westus";

/// Identifiers required to run the workflow. Immutable once validated.
#[derive(Clone)]
pub struct WorkflowConfig {
    /// Service principal (application) id
    pub client_id: String,
    /// Tenant / domain id
    pub tenant_id: String,
    pub client_secret: Zeroizing<String>,
    pub subscription_id: String,
    /// Object id granted access when the vault is created
    pub object_id: Option<String>,
    /// Object id granted access by the later policy update
    pub secondary_object_id: Option<String>,
    /// Application id of the principal behind `secondary_object_id`
    pub secondary_application_id: Option<String>,
}

impl fmt::Debug for WorkflowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowConfig")
            .field("client_id", &self.client_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_secret", &"<redacted>")
            .field("subscription_id", &self.subscription_id)
            .field("object_id", &self.object_id)
            .field("secondary_object_id", &self.secondary_object_id)
            .field("secondary_application_id", &self.secondary_application_id)
            .finish()
    }
}

/// Unvalidated configuration values as read from the environment.
#[derive(Clone, Default)]
pub struct ConfigSource {
    pub client_id: Option<String>,
    pub domain: Option<String>,
    pub application_secret: Option<Zeroizing<String>>,
    pub subscription_id: Option<String>,
    pub object_id: Option<String>,
    pub object_id_keyvault_operations: Option<String>,
    pub sp_keyvault_operations: Option<String>,
}

impl ConfigSource {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            client_id: lookup(ENV_CLIENT_ID),
            domain: lookup(ENV_DOMAIN),
            application_secret: lookup(ENV_APPLICATION_SECRET).map(Zeroizing::new),
            subscription_id: lookup(ENV_SUBSCRIPTION_ID),
            object_id: lookup(ENV_OBJECT_ID),
            object_id_keyvault_operations: lookup(ENV_OBJECT_ID_KEYVAULT_OPERATIONS),
            sp_keyvault_operations: lookup(ENV_SP_KEYVAULT_OPERATIONS),
        }
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl WorkflowConfig {
    /// Validate a configuration source.
    ///
    /// Every absent or blank mandatory value is reported in one error.
    pub fn from_source(source: ConfigSource) -> Result<Self> {
        let client_id = present(source.client_id);
        let tenant_id = present(source.domain);
        let client_secret = source
            .application_secret
            .filter(|v| !v.trim().is_empty());
        let subscription_id = present(source.subscription_id);

        let mut missing = Vec::new();
        if client_id.is_none() {
            missing.push(ENV_CLIENT_ID);
        }
        if tenant_id.is_none() {
            missing.push(ENV_DOMAIN);
        }
        if client_secret.is_none() {
            missing.push(ENV_APPLICATION_SECRET);
        }
        if subscription_id.is_none() {
            missing.push(ENV_SUBSCRIPTION_ID);
        }

        match (client_id, tenant_id, client_secret, subscription_id) {
            (Some(client_id), Some(tenant_id), Some(client_secret), Some(subscription_id)) => {
                Ok(Self {
                    client_id,
                    tenant_id,
                    client_secret,
                    subscription_id,
                    object_id: present(source.object_id),
                    secondary_object_id: present(source.object_id_keyvault_operations),
                    secondary_application_id: present(source.sp_keyvault_operations),
                })
            }
            _ => Err(ProvisionError::missing_configuration(missing)),
        }
    }
}

/// Tuning for a single run. Every value has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    pub location: String,
    pub settle_delay: Duration,
    pub management_endpoint: String,
    pub login_endpoint: String,
    pub no_color: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            location: DEFAULT_LOCATION.to_string(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            management_endpoint: DEFAULT_MANAGEMENT_ENDPOINT.to_string(),
            login_endpoint: DEFAULT_LOGIN_ENDPOINT.to_string(),
            no_color: false,
        }
    }
}

impl RunSettings {
    pub fn validate(&self) -> Result<()> {
        if self.location.trim().is_empty() {
            return Err(ProvisionError::config("Location must not be empty"));
        }
        for (name, endpoint) in [
            ("management endpoint", &self.management_endpoint),
            ("login endpoint", &self.login_endpoint),
        ] {
            url::Url::parse(endpoint).map_err(|e| {
                ProvisionError::config(format!("Invalid {} '{}': {}", name, endpoint, e))
            })?;
        }
        Ok(())
    }
}

//! Vault operations implementation
//!
//! Management-plane create, read and delete of a Key Vault resource.

use async_trait::async_trait;
use std::sync::Arc;

use super::models::{Vault, VaultCreateOrUpdateParameters};
use crate::arm::ArmClient;
use crate::error::Result;

const API_VERSION: &str = "2023-07-01";

/// Trait for vault operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VaultOperations: Send + Sync {
    /// Create a vault, or write a full definition over an existing one
    async fn create_or_update(
        &self,
        resource_group: &str,
        vault_name: &str,
        parameters: &VaultCreateOrUpdateParameters,
    ) -> Result<Vault>;

    /// Get the current vault definition
    async fn get(&self, resource_group: &str, vault_name: &str) -> Result<Vault>;

    /// Delete the vault
    async fn delete(&self, resource_group: &str, vault_name: &str) -> Result<()>;
}

/// Azure vault operations implementation
pub struct AzureVaultOperations {
    arm: Arc<ArmClient>,
}

impl AzureVaultOperations {
    pub fn new(arm: Arc<ArmClient>) -> Self {
        Self { arm }
    }

    fn vault_url(&self, resource_group: &str, vault_name: &str) -> String {
        self.arm.url(
            &format!(
                "/resourceGroups/{}/providers/Microsoft.KeyVault/vaults/{}",
                resource_group, vault_name
            ),
            API_VERSION,
        )
    }
}

#[async_trait]
impl VaultOperations for AzureVaultOperations {
    async fn create_or_update(
        &self,
        resource_group: &str,
        vault_name: &str,
        parameters: &VaultCreateOrUpdateParameters,
    ) -> Result<Vault> {
        self.arm
            .put(&self.vault_url(resource_group, vault_name), parameters)
            .await
    }

    async fn get(&self, resource_group: &str, vault_name: &str) -> Result<Vault> {
        self.arm
            .get(&self.vault_url(resource_group, vault_name), "Vault", vault_name)
            .await
    }

    async fn delete(&self, resource_group: &str, vault_name: &str) -> Result<()> {
        self.arm
            .delete(&self.vault_url(resource_group, vault_name))
            .await?;
        Ok(())
    }
}

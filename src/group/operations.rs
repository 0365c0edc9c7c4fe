//! Resource group operations

use async_trait::async_trait;
use std::sync::Arc;

use super::models::{ResourceGroup, ResourceGroupParameters};
use crate::arm::ArmClient;
use crate::error::Result;

const API_VERSION: &str = "2021-04-01";

/// Trait for resource group operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResourceGroupOperations: Send + Sync {
    /// Create the group, or converge an existing group with the same name
    async fn create_or_update(
        &self,
        name: &str,
        parameters: &ResourceGroupParameters,
    ) -> Result<ResourceGroup>;

    /// Delete the group and everything in it
    async fn delete(&self, name: &str) -> Result<()>;
}

/// Azure resource group operations implementation
pub struct AzureResourceGroupOperations {
    arm: Arc<ArmClient>,
}

impl AzureResourceGroupOperations {
    pub fn new(arm: Arc<ArmClient>) -> Self {
        Self { arm }
    }

    fn group_url(&self, name: &str) -> String {
        self.arm.url(&format!("/resourcegroups/{}", name), API_VERSION)
    }
}

#[async_trait]
impl ResourceGroupOperations for AzureResourceGroupOperations {
    async fn create_or_update(
        &self,
        name: &str,
        parameters: &ResourceGroupParameters,
    ) -> Result<ResourceGroup> {
        self.arm.put(&self.group_url(name), parameters).await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.arm.delete(&self.group_url(name)).await?;
        Ok(())
    }
}

//! Management-plane session
//!
//! Holds the credential acquired by the workflow's login step and hands out
//! bearer headers to the resource-group and vault-management clients.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::provider::{Audience, Credential, TokenProvider};
use crate::error::Result;

/// Step-1 login against the management plane.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ManagementLogin: Send + Sync {
    async fn login(&self) -> Result<Credential>;
}

pub struct ManagementSession {
    provider: Arc<dyn TokenProvider>,
    audience: Audience,
    current: Mutex<Option<Credential>>,
}

impl ManagementSession {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self::with_audience(provider, Audience::management())
    }

    pub fn with_audience(provider: Arc<dyn TokenProvider>, audience: Audience) -> Self {
        Self {
            provider,
            audience,
            current: Mutex::new(None),
        }
    }

    /// `Authorization` header value for a management-plane request.
    ///
    /// Reuses the login credential until a minute before it expires.
    pub async fn authorization(&self) -> Result<String> {
        let mut current = self.current.lock().await;
        if let Some(credential) = current.as_ref() {
            if !credential.expires_within(time::Duration::minutes(1)) {
                return Ok(credential.authorization_value());
            }
        }

        debug!(resource = %self.audience.resource, "Acquiring management credential");
        let credential = self.provider.acquire(&self.audience).await?;
        let value = credential.authorization_value();
        *current = Some(credential);
        Ok(value)
    }
}

#[async_trait]
impl ManagementLogin for ManagementSession {
    async fn login(&self) -> Result<Credential> {
        let credential = self.provider.acquire(&self.audience).await?;
        info!(
            resource = %credential.audience,
            expires_on = %credential.expires_on(),
            "Authenticated against the management plane"
        );
        *self.current.lock().await = Some(credential.clone());
        Ok(credential)
    }
}

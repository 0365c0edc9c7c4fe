//! Challenge/response authentication for the vault data plane
//!
//! The data plane answers an unauthenticated request with `401` and a
//! `WWW-Authenticate: Bearer authorization="...", resource="..."` header naming
//! the authority and audience to obtain a token for.

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::provider::{Audience, TokenProvider};
use crate::error::{ProvisionError, Result};

/// Parameters of a Bearer authentication challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    /// Authorization endpoint (authority) to request the token from.
    pub authorization: String,
    /// Resource URI the token must be scoped to.
    pub resource: String,
    pub scope: Option<String>,
}

impl AuthChallenge {
    /// Parse a `WWW-Authenticate` header value.
    pub fn parse(header: &str) -> Result<Self> {
        let header = header.trim();
        let params = header
            .strip_prefix("Bearer")
            .or_else(|| header.strip_prefix("bearer"))
            .ok_or_else(|| {
                ProvisionError::authentication(format!("Unsupported authentication challenge: {}", header))
            })?;

        let re = Regex::new(r#"([A-Za-z_]+)="([^"]*)""#)?;
        let values: HashMap<String, String> = re
            .captures_iter(params)
            .map(|c| (c[1].to_lowercase(), c[2].to_string()))
            .collect();

        let authorization = values
            .get("authorization")
            .or_else(|| values.get("authorization_uri"))
            .cloned()
            .ok_or_else(|| ProvisionError::authentication("Challenge carried no authorization endpoint"))?;

        let scope = values.get("scope").cloned();
        let resource = match (values.get("resource"), &scope) {
            (Some(resource), _) => resource.clone(),
            (None, Some(scope)) => scope.trim_end_matches("/.default").to_string(),
            (None, None) => {
                return Err(ProvisionError::authentication(
                    "Challenge carried neither resource nor scope",
                ))
            }
        };

        Ok(Self {
            authorization,
            resource,
            scope,
        })
    }

    pub fn audience(&self) -> Audience {
        Audience::new(self.resource.clone()).with_authority(self.authorization.clone())
    }
}

/// Answers an authentication challenge with an `Authorization` header value.
#[async_trait]
pub trait ChallengeAuthenticator: Send + Sync {
    async fn authenticate(&self, challenge: &AuthChallenge) -> Result<String>;
}

/// Bridges data-plane challenges to a [`TokenProvider`]. Every challenge
/// performs its own token exchange.
pub struct TokenProviderAuthenticator {
    provider: Arc<dyn TokenProvider>,
}

impl TokenProviderAuthenticator {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ChallengeAuthenticator for TokenProviderAuthenticator {
    async fn authenticate(&self, challenge: &AuthChallenge) -> Result<String> {
        debug!(
            authority = %challenge.authorization,
            resource = %challenge.resource,
            "Answering data-plane challenge"
        );
        let credential = self.provider.acquire(&challenge.audience()).await?;
        Ok(format!("{} {}", credential.token_type, credential.access_token()))
    }
}

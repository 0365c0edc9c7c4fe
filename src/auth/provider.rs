//! Identity provider: exchanges the service principal's secret for bearer tokens
//!
//! Tokens are bound to one audience (a resource URI such as the management
//! plane or the vault data plane) and must be reacquired for every other
//! audience. Nothing here is persisted.

use async_trait::async_trait;
use azure_core::auth::AccessToken;
use reqwest::Client;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{ProvisionError, Result};
use crate::utils::network::{classify_network_error, parse_azure_error};

/// Public Azure cloud login endpoint.
pub const DEFAULT_LOGIN_ENDPOINT: &str = "https://login.microsoftonline.com";

/// Resource URI for Azure Resource Manager tokens.
pub const MANAGEMENT_RESOURCE: &str = "https://management.core.windows.net/";

/// Target of a token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audience {
    /// Resource URI the token must be valid for.
    pub resource: String,
    /// Authority to request the token from. `None` uses the configured tenant.
    pub authority: Option<String>,
}

impl Audience {
    pub fn new<S: Into<String>>(resource: S) -> Self {
        Self {
            resource: resource.into(),
            authority: None,
        }
    }

    pub fn with_authority<S: Into<String>>(mut self, authority: S) -> Self {
        self.authority = Some(authority.into());
        self
    }

    /// Audience for management-plane calls.
    pub fn management() -> Self {
        Self::new(MANAGEMENT_RESOURCE)
    }
}

/// Bearer token bound to one audience.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token_type: String,
    pub audience: String,
    pub token: AccessToken,
}

impl Credential {
    pub fn access_token(&self) -> &str {
        self.token.token.secret()
    }

    pub fn expires_on(&self) -> OffsetDateTime {
        self.token.expires_on
    }

    /// Value for the HTTP `Authorization` header.
    pub fn authorization_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token())
    }

    /// True once the token is within `margin` of its expiry.
    pub fn expires_within(&self, margin: time::Duration) -> bool {
        self.token.expires_on - margin <= OffsetDateTime::now_utc()
    }
}

/// Source of audience-scoped credentials
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn acquire(&self, audience: &Audience) -> Result<Credential>;
}

/// Client-credentials grant for a service principal.
pub struct ClientSecretTokenProvider {
    http_client: Client,
    login_endpoint: String,
    tenant_id: String,
    client_id: String,
    client_secret: Zeroizing<String>,
}

impl ClientSecretTokenProvider {
    pub fn new(
        http_client: Client,
        login_endpoint: &str,
        tenant_id: &str,
        client_id: &str,
        client_secret: Zeroizing<String>,
    ) -> Self {
        Self {
            http_client,
            login_endpoint: login_endpoint.trim_end_matches('/').to_string(),
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            client_secret,
        }
    }

    /// Token endpoint for an audience.
    ///
    /// Only the tenant is taken from a challenge authority. The request, which
    /// carries the client secret, always goes to the configured login endpoint.
    fn token_url(&self, audience: &Audience) -> Result<String> {
        let tenant = match &audience.authority {
            Some(authority) => authority_tenant(authority)?,
            None => self.tenant_id.clone(),
        };
        Ok(format!("{}/{}/oauth2/token", self.login_endpoint, tenant))
    }

    fn parse_token_response(audience: &Audience, body: &Value) -> Result<Credential> {
        let access_token = body
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProvisionError::authentication("Token response carried no access_token"))?;

        let token_type = body
            .get("token_type")
            .and_then(|v| v.as_str())
            .unwrap_or("Bearer");

        // The v1 endpoint sends expires_in as a string.
        let expires_in = body
            .get("expires_in")
            .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or(3600);

        let expires_on = OffsetDateTime::now_utc()
            .checked_add(time::Duration::seconds(expires_in))
            .ok_or_else(|| {
                ProvisionError::authentication(format!(
                    "Token response expiry out of range: expires_in={}",
                    expires_in
                ))
            })?;

        Ok(Credential {
            token_type: token_type.to_string(),
            audience: audience.resource.clone(),
            token: AccessToken::new(access_token.to_string(), expires_on),
        })
    }
}

/// Tenant named by an authority such as `https://login.windows.net/{tenant}`.
fn authority_tenant(authority: &str) -> Result<String> {
    let parsed = url::Url::parse(authority).map_err(|e| {
        ProvisionError::authentication(format!("Invalid challenge authority '{}': {}", authority, e))
    })?;

    parsed
        .path_segments()
        .and_then(|mut segments| segments.find(|s| !s.is_empty()))
        .map(str::to_string)
        .ok_or_else(|| {
            ProvisionError::authentication(format!(
                "Challenge authority '{}' names no tenant",
                authority
            ))
        })
}

#[async_trait]
impl TokenProvider for ClientSecretTokenProvider {
    async fn acquire(&self, audience: &Audience) -> Result<Credential> {
        let url = self.token_url(audience)?;
        debug!(url = %url, resource = %audience.resource, "Requesting access token");

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("resource", audience.resource.as_str()),
        ];

        let response = self
            .http_client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| classify_network_error(&e, &url))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisionError::authentication(
                parse_azure_error(status, &body).to_string(),
            ));
        }

        let body: Value = response.json().await.map_err(|e| {
            ProvisionError::serialization(format!("Failed to parse token response: {}", e))
        })?;

        Self::parse_token_response(audience, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> ClientSecretTokenProvider {
        ClientSecretTokenProvider::new(
            Client::new(),
            "https://login.microsoftonline.com/",
            "tenant-1",
            "client-1",
            Zeroizing::new("s3cret".to_string()),
        )
    }

    #[test]
    fn token_url_defaults_to_tenant_authority() {
        let url = provider().token_url(&Audience::management()).unwrap();
        assert_eq!(url, "https://login.microsoftonline.com/tenant-1/oauth2/token");
    }

    #[test]
    fn challenge_authority_only_selects_tenant() {
        let audience = Audience::new("https://vault.azure.net")
            .with_authority("https://login.attacker.example/other-tenant/");
        let url = provider().token_url(&audience).unwrap();
        assert_eq!(url, "https://login.microsoftonline.com/other-tenant/oauth2/token");
    }

    #[test]
    fn authority_without_tenant_is_rejected() {
        let audience =
            Audience::new("https://vault.azure.net").with_authority("https://login.windows.net/");
        let err = provider().token_url(&audience).unwrap_err();
        assert!(matches!(err, ProvisionError::AuthenticationError(_)));
    }

    #[test]
    fn out_of_range_expiry_is_an_error() {
        let body = json!({
            "token_type": "Bearer",
            "expires_in": "9223372036854775807",
            "access_token": "abc"
        });
        let err = ClientSecretTokenProvider::parse_token_response(&Audience::management(), &body)
            .unwrap_err();
        assert!(matches!(err, ProvisionError::AuthenticationError(_)));
    }

    #[test]
    fn parses_string_expiry() {
        let body = json!({
            "token_type": "Bearer",
            "expires_in": "3599",
            "access_token": "abc"
        });
        let credential =
            ClientSecretTokenProvider::parse_token_response(&Audience::management(), &body).unwrap();

        assert_eq!(credential.authorization_value(), "Bearer abc");
        assert_eq!(credential.audience, MANAGEMENT_RESOURCE);
        assert!(!credential.expires_within(time::Duration::minutes(1)));
    }

    #[test]
    fn missing_access_token_is_an_authentication_error() {
        let body = json!({ "token_type": "Bearer" });
        let err = ClientSecretTokenProvider::parse_token_response(&Audience::management(), &body)
            .unwrap_err();
        assert!(matches!(err, ProvisionError::AuthenticationError(_)));
    }
}

//! Vault data-plane operations
//!
//! Every request is sent without credentials first. The vault answers with a
//! `401` Bearer challenge, the [`ChallengeAuthenticator`] turns that into an
//! `Authorization` header, and the request is sent again. Tokens are not
//! kept between calls.

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::models::{
    CreateKeyParameters, KeyBundle, KeyItem, Page, SecretBundle, SecretItem, SetSecretParameters,
};
use crate::auth::challenge::{AuthChallenge, ChallengeAuthenticator};
use crate::error::{ProvisionError, Result};
use crate::utils::helpers::vault_url;
use crate::utils::network::{
    classify_network_error, client_request_id, parse_azure_error, CLIENT_REQUEST_ID_HEADER,
};

const API_VERSION: &str = "7.4";

/// Trait for operations on the contents of a provisioned vault
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VaultDataOperations: Send + Sync {
    async fn create_key(
        &self,
        vault_uri: &str,
        key_name: &str,
        parameters: &CreateKeyParameters,
    ) -> Result<KeyBundle>;

    /// List every key in the vault
    async fn get_keys(&self, vault_uri: &str) -> Result<Vec<KeyItem>>;

    async fn set_secret(
        &self,
        vault_uri: &str,
        secret_name: &str,
        parameters: &SetSecretParameters,
    ) -> Result<SecretBundle>;

    /// List every secret in the vault
    async fn get_secrets(&self, vault_uri: &str) -> Result<Vec<SecretItem>>;
}

/// Key Vault REST client authenticating through challenge/response
pub struct AzureVaultDataClient {
    http_client: Client,
    authenticator: Arc<dyn ChallengeAuthenticator>,
}

impl AzureVaultDataClient {
    pub fn new(http_client: Client, authenticator: Arc<dyn ChallengeAuthenticator>) -> Self {
        Self {
            http_client,
            authenticator,
        }
    }

    fn endpoint(vault_uri: &str, path: &str) -> Result<String> {
        let mut url = vault_url(vault_uri, path)?;
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url.to_string())
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        body: Option<&Value>,
        authorization: Option<&str>,
    ) -> Result<Response> {
        let mut request = self
            .http_client
            .request(method.clone(), url)
            .header(CLIENT_REQUEST_ID_HEADER, client_request_id());
        if let Some(authorization) = authorization {
            request = request.header(reqwest::header::AUTHORIZATION, authorization);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        request
            .send()
            .await
            .map_err(|e| classify_network_error(&e, url))
    }

    /// Send a request, answering the vault's authentication challenge.
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        debug!(%method, url, "Key Vault request");
        let mut response = self.send_once(&method, url, body, None).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let header = response
                .headers()
                .get(reqwest::header::WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    ProvisionError::authentication(format!(
                        "Vault rejected {} without an authentication challenge",
                        url
                    ))
                })?;
            let challenge = AuthChallenge::parse(header)?;
            let authorization = self.authenticator.authenticate(&challenge).await?;
            response = self
                .send_once(&method, url, body, Some(&authorization))
                .await?;
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                401 | 403 => ProvisionError::authentication(parse_azure_error(status, &body).to_string()),
                _ => parse_azure_error(status, &body),
            });
        }

        response.json().await.map_err(|e| {
            ProvisionError::serialization(format!("Failed to parse response from {}: {}", url, e))
        })
    }

    /// Follow `nextLink` until the listing is exhausted.
    async fn list_all<T: DeserializeOwned>(&self, first_url: String) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(first_url);

        while let Some(url) = next {
            let page: Page<T> = self.send(Method::GET, &url, None).await?;
            items.extend(page.value);
            next = page.next_link.filter(|link| !link.is_empty());
        }

        Ok(items)
    }
}

#[async_trait]
impl VaultDataOperations for AzureVaultDataClient {
    async fn create_key(
        &self,
        vault_uri: &str,
        key_name: &str,
        parameters: &CreateKeyParameters,
    ) -> Result<KeyBundle> {
        let url = Self::endpoint(vault_uri, &format!("keys/{}/create", key_name))?;
        let body = serde_json::to_value(parameters)?;
        self.send(Method::POST, &url, Some(&body)).await
    }

    async fn get_keys(&self, vault_uri: &str) -> Result<Vec<KeyItem>> {
        let url = Self::endpoint(vault_uri, "keys")?;
        self.list_all(url).await
    }

    async fn set_secret(
        &self,
        vault_uri: &str,
        secret_name: &str,
        parameters: &SetSecretParameters,
    ) -> Result<SecretBundle> {
        let url = Self::endpoint(vault_uri, &format!("secrets/{}", secret_name))?;
        let body = serde_json::to_value(parameters)?;
        self.send(Method::PUT, &url, Some(&body)).await
    }

    async fn get_secrets(&self, vault_uri: &str) -> Result<Vec<SecretItem>> {
        let url = Self::endpoint(vault_uri, "secrets")?;
        self.list_all(url).await
    }
}

//! Azure Resource Manager transport shared by the management-plane clients

use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::auth::session::ManagementSession;
use crate::error::{ProvisionError, Result};
use crate::utils::network::{
    classify_network_error, client_request_id, parse_azure_error, CLIENT_REQUEST_ID_HEADER,
};

/// Public Azure cloud management endpoint.
pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// Authorized JSON requests against the management plane.
pub struct ArmClient {
    http_client: Client,
    session: Arc<ManagementSession>,
    endpoint: String,
    subscription_id: String,
}

impl ArmClient {
    pub fn new(
        http_client: Client,
        session: Arc<ManagementSession>,
        endpoint: &str,
        subscription_id: &str,
    ) -> Self {
        Self {
            http_client,
            session,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            subscription_id: subscription_id.to_string(),
        }
    }

    /// Absolute URL for a subscription-relative resource path.
    pub fn url(&self, path: &str, api_version: &str) -> String {
        format!(
            "{}/subscriptions/{}{}?api-version={}",
            self.endpoint, self.subscription_id, path, api_version
        )
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let authorization = self.session.authorization().await?;
        debug!(%method, url, "Azure ARM request");
        Ok(self
            .http_client
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(CLIENT_REQUEST_ID_HEADER, client_request_id()))
    }

    pub async fn put<B, T>(&self, url: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::PUT, url)
            .await?
            .json(body)
            .send()
            .await
            .map_err(|e| classify_network_error(&e, url))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(parse_azure_error(status, &body));
        }

        response.json().await.map_err(|e| {
            ProvisionError::serialization(format!("Failed to parse response from {}: {}", url, e))
        })
    }

    /// GET a resource. `kind` and `name` describe it in a 404 error.
    pub async fn get<T>(&self, url: &str, kind: &str, name: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, url)
            .await?
            .send()
            .await
            .map_err(|e| classify_network_error(&e, url))?;

        if response.status().as_u16() == 404 {
            return Err(ProvisionError::not_found(kind, name));
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(parse_azure_error(status, &body));
        }

        response.json().await.map_err(|e| {
            ProvisionError::serialization(format!("Failed to parse response from {}: {}", url, e))
        })
    }

    /// DELETE a resource. An accepted long-running delete is not awaited, and an
    /// already-absent resource counts as deleted.
    pub async fn delete(&self, url: &str) -> Result<u16> {
        let response = self
            .request(Method::DELETE, url)
            .await?
            .send()
            .await
            .map_err(|e| classify_network_error(&e, url))?;

        let status = response.status().as_u16();
        match status {
            200 | 202 | 204 | 404 => Ok(status),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(parse_azure_error(status, &body))
            }
        }
    }
}

use crate::error::{ProvisionError, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Header Azure services echo back to correlate a request in their logs.
pub const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// Configuration for HTTP client with proper timeouts and user-friendly error handling
pub struct NetworkConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
            user_agent: format!("kv-provision/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Create a properly configured HTTP client with timeouts
pub fn create_http_client(config: &NetworkConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .user_agent(&config.user_agent)
        .build()
        .map_err(|e| ProvisionError::network(format!("Failed to create HTTP client: {}", e)))
}

/// Fresh correlation id for a single outgoing request.
pub fn client_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Classify a transport failure into the error taxonomy.
pub fn classify_network_error(error: &reqwest::Error, url: &str) -> ProvisionError {
    let host = extract_host(url);

    if error.is_timeout() {
        return ProvisionError::connection_timeout(format!(
            "Request to '{}' timed out",
            host
        ));
    }

    if error.is_connect() {
        if is_dns_resolution_error(error) {
            return ProvisionError::dns_resolution(
                host.clone(),
                format!(
                    "Unable to resolve '{}'. A newly created vault may not be registered in DNS yet.",
                    host
                ),
            );
        }

        return ProvisionError::network(format!("Failed to connect to '{}': {}", host, error));
    }

    ProvisionError::network(format!("Network error when calling '{}': {}", host, error))
}

/// Turn a non-success response body into an Azure API error.
///
/// Azure services answer with `{"error": {"code": ..., "message": ...}}`; the
/// identity endpoint uses `error` / `error_description` at the top level instead.
pub fn parse_azure_error(status: u16, body: &str) -> ProvisionError {
    if let Ok(error_json) = serde_json::from_str::<Value>(body) {
        if let Some(error) = error_json.get("error") {
            if let Some(message) = error.get("message").and_then(|m| m.as_str()) {
                let code = error.get("code").and_then(|c| c.as_str()).unwrap_or("Unknown");
                return ProvisionError::azure_api(format!("HTTP {} {}: {}", status, code, message));
            }
            if let Some(description) = error_json.get("error_description").and_then(|d| d.as_str()) {
                return ProvisionError::azure_api(format!(
                    "HTTP {} {}: {}",
                    status,
                    error.as_str().unwrap_or("error"),
                    description
                ));
            }
        }
    }
    ProvisionError::azure_api(format!("HTTP {}: {}", status, body))
}

fn is_dns_resolution_error(error: &reqwest::Error) -> bool {
    let error_msg = format!("{:?}", error).to_lowercase();
    let dns_indicators = [
        "dns",
        "name resolution",
        "failed to lookup address",
        "name or service not known",
        "nodename nor servname provided",
        "no such host",
        "host not found",
        "getaddrinfo failed",
        "could not resolve host",
    ];

    dns_indicators
        .iter()
        .any(|&indicator| error_msg.contains(indicator))
}

fn extract_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_host() {
        let url = "https://testkv42.vault.azure.net/secrets/mysecret?api-version=7.4";
        assert_eq!(extract_host(url), "testkv42.vault.azure.net");
        assert_eq!(extract_host("not a url"), "not a url");
    }

    #[test]
    fn test_parse_arm_error() {
        let body = r#"{"error":{"code":"VaultAlreadyExists","message":"The vault name is already in use."}}"#;
        let err = parse_azure_error(409, body);
        assert_eq!(
            err.to_string(),
            "Azure API error: HTTP 409 VaultAlreadyExists: The vault name is already in use."
        );
    }

    #[test]
    fn test_parse_identity_error() {
        let body = r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret provided."}"#;
        let err = parse_azure_error(401, body);
        assert!(err.to_string().contains("invalid_client"));
        assert!(err.to_string().contains("AADSTS7000215"));
    }

    #[test]
    fn test_parse_unstructured_error() {
        let err = parse_azure_error(502, "Bad Gateway");
        assert_eq!(err.to_string(), "Azure API error: HTTP 502: Bad Gateway");
    }
}

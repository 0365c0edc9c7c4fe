use thiserror::Error;

use crate::workflow::WorkflowStep;

/// Main error type for kv-provision operations
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("please set/export the following environment variables: {}", missing.join(","))]
    MissingConfiguration { missing: Vec<String> },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Azure API error: {0}")]
    AzureApiError(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("DNS resolution failed for '{host}': {details}")]
    DnsResolutionError { host: String, details: String },

    #[error("Connection timeout: {0}")]
    ConnectionTimeout(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: WorkflowStep,
        #[source]
        source: Box<ProvisionError>,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),
}

impl ProvisionError {
    pub fn missing_configuration<I, S>(missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MissingConfiguration {
            missing: missing.into_iter().map(Into::into).collect(),
        }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn authentication<S: Into<String>>(msg: S) -> Self {
        Self::AuthenticationError(msg.into())
    }

    pub fn azure_api<S: Into<String>>(msg: S) -> Self {
        Self::AzureApiError(msg.into())
    }

    pub fn not_found<K: Into<String>, N: Into<String>>(kind: K, name: N) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::NetworkError(msg.into())
    }

    pub fn dns_resolution<S: Into<String>>(host: S, details: S) -> Self {
        Self::DnsResolutionError {
            host: host.into(),
            details: details.into(),
        }
    }

    pub fn connection_timeout<S: Into<String>>(msg: S) -> Self {
        Self::ConnectionTimeout(msg.into())
    }

    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Self::SerializationError(msg.into())
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn step_failed(step: WorkflowStep, source: ProvisionError) -> Self {
        Self::StepFailed {
            step,
            source: Box::new(source),
        }
    }

    /// The workflow step this error was raised from, if any.
    pub fn failed_step(&self) -> Option<WorkflowStep> {
        match self {
            Self::StepFailed { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The original error beneath any step wrapper.
    pub fn root_cause(&self) -> &ProvisionError {
        match self {
            Self::StepFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Transport failures that typically clear up on their own, such as a vault
    /// hostname that has not propagated through DNS yet.
    pub fn is_transient(&self) -> bool {
        match self.root_cause() {
            Self::DnsResolutionError { .. } | Self::ConnectionTimeout(_) => true,
            Self::NetworkError(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("connect") || msg.contains("temporar")
            }
            _ => false,
        }
    }
}

/// Result type alias for kv-provision operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

pub mod api;
pub mod http;

pub use api::*;
pub use http::*;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// A logical endpoint on the bot process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Resource {
    Status,
    Balance,
    Positions,
    ClosePosition(String),
    Config,
    Start,
    Stop,
    TestConnection,
    Logs,
    /// Proxy-local liveness probe; may live on a different host than the bot.
    Health,
}

impl Resource {
    /// Path segments relative to the base URL. Segments are percent-encoded when joined.
    pub fn segments(&self) -> Vec<&str> {
        match self {
            Resource::Status => vec!["status"],
            Resource::Balance => vec!["balance"],
            Resource::Positions => vec!["positions"],
            Resource::ClosePosition(symbol) => vec!["positions", symbol.as_str(), "close"],
            Resource::Config => vec!["config"],
            Resource::Start => vec!["start"],
            Resource::Stop => vec!["stop"],
            Resource::TestConnection => vec!["test-connection"],
            Resource::Logs => vec!["logs"],
            Resource::Health => vec!["health"],
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.segments().join("/"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Host unreachable, timeout, connection reset.
    Network,
    /// Non-2xx answer or a body that isn't the expected JSON.
    BackendError,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Network => write!(f, "network"),
            FailureReason::BackendError => write!(f, "backend_error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{reason}: {detail}")]
pub struct GatewayError {
    pub reason: FailureReason,
    pub detail: String,
    pub status: Option<u16>,
}

impl GatewayError {
    pub fn network(detail: impl Into<String>) -> Self {
        Self {
            reason: FailureReason::Network,
            detail: detail.into(),
            status: None,
        }
    }

    pub fn backend(status: Option<u16>, detail: impl Into<String>) -> Self {
        Self {
            reason: FailureReason::BackendError,
            detail: detail.into(),
            status,
        }
    }

    pub fn is_network(&self) -> bool {
        self.reason == FailureReason::Network
    }
}

/// Uniform request/response wrapper around the bot's HTTP resources.
///
/// Failures come back as values; no retries happen at this layer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn call(
        &self,
        resource: &Resource,
        method: Method,
        body: Option<Value>,
    ) -> Result<Value, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_paths() {
        assert_eq!(Resource::Status.to_string(), "/status");
        assert_eq!(
            Resource::ClosePosition("BTCUSDT".to_string()).to_string(),
            "/positions/BTCUSDT/close"
        );
        assert_eq!(Resource::TestConnection.to_string(), "/test-connection");
    }

    #[test]
    fn test_error_display() {
        let err = GatewayError::backend(Some(500), "boom");
        assert_eq!(err.to_string(), "backend_error: boom");
        assert!(!err.is_network());
        assert!(GatewayError::network("refused").is_network());
    }
}

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{Gateway, GatewayError, Method, Resource};
use crate::config::BackendSettings;

const MAX_DETAIL_LEN: usize = 200;

/// Gateway over plain JSON/HTTP to the bot process.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    health_url: Url,
}

impl HttpGateway {
    pub fn new(settings: &BackendSettings) -> Result<Self> {
        Self::with_urls(
            &settings.base_url,
            &settings.health_url(),
            settings.request_timeout(),
        )
    }

    pub fn with_urls(base_url: &str, health_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| anyhow!("Invalid backend url {}: {}", base_url, e))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("Backend url {} cannot carry a path", base_url));
        }
        let health_url = Url::parse(health_url)
            .map_err(|e| anyhow!("Invalid health url {}: {}", health_url, e))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            health_url,
        })
    }

    pub fn url_for(&self, resource: &Resource) -> Result<Url, GatewayError> {
        if *resource == Resource::Health {
            return Ok(self.health_url.clone());
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::network(format!("{} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(resource.segments());
        Ok(url)
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn call(
        &self,
        resource: &Resource,
        method: Method,
        body: Option<Value>,
    ) -> Result<Value, GatewayError> {
        let url = self.url_for(resource)?;
        debug!("{} {}", method, url);

        let mut request = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        if let Some(body) = body {
            request = request.json(&body);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| GatewayError::network(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GatewayError::network(e.to_string()))?;

        if !status.is_success() {
            let detail = error_detail(&text).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            return Err(GatewayError::backend(Some(status.as_u16()), detail));
        }

        // The keep-alive target answers with whatever body it likes; only the status counts.
        if *resource == Resource::Health || text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            GatewayError::backend(Some(status.as_u16()), format!("malformed response: {}", e))
        })
    }
}

/// Pulls a human-readable message out of an error body: FastAPI's `detail`, the proxy's
/// `error`, or a bare `message`; otherwise the raw text.
fn error_detail(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
        for key in ["detail", "error", "message"] {
            if let Some(msg) = json.get(key).and_then(|v| v.as_str()) {
                return Some(msg.to_string());
            }
        }
    }

    Some(trimmed.chars().take(MAX_DETAIL_LEN).collect())
}

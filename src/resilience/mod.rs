//! What the view shows when a gateway call fails.
//!
//! Balance, config and logs absorb failures into a substitute value tagged `degraded`.
//! Everything else surfaces a `{error: message}` to the caller and fabricates nothing.
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::config::TradingConfig;
use crate::gateway::GatewayError;
use crate::types::{BalanceSnapshot, LogLine, TestConnectionReport};

/// A value for display, plus whether it is a local stand-in for a failed fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolved<T> {
    pub value: T,
    pub degraded: bool,
}

impl<T> Resolved<T> {
    pub fn live(value: T) -> Self {
        Self {
            value,
            degraded: false,
        }
    }

    pub fn degraded(value: T) -> Self {
        Self {
            value,
            degraded: true,
        }
    }

}

/// The error shape handed to display code for resources with no fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurfacedError {
    pub error: String,
}

impl std::fmt::Display for SurfacedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.error)
    }
}

impl std::error::Error for SurfacedError {}

impl From<GatewayError> for SurfacedError {
    fn from(e: GatewayError) -> Self {
        Self {
            error: e.to_string(),
        }
    }
}

/// Fixed stand-in shown when `/balance` cannot be fetched.
pub fn simulated_balance() -> BalanceSnapshot {
    BalanceSnapshot {
        total_balance: 1000.0,
        available_balance: 850.0,
        used_balance: 150.0,
        unrealized_pnl: 25.5,
        total_wallet_balance: 1025.5,
        currency: "USDT".to_string(),
        margin_ratio: None,
    }
}

pub fn resolve_balance(result: Result<BalanceSnapshot, GatewayError>) -> Resolved<BalanceSnapshot> {
    match result {
        Ok(balance) => Resolved::live(balance),
        Err(e) => {
            warn!("Balance unavailable ({}), showing simulated balance", e);
            Resolved::degraded(simulated_balance())
        }
    }
}

pub fn resolve_config(result: Result<Value, GatewayError>) -> Resolved<TradingConfig> {
    match result {
        Ok(raw) => Resolved::live(TradingConfig::merge_with_defaults(&raw)),
        Err(e) => {
            warn!("Config unavailable ({}), using defaults", e);
            Resolved::degraded(TradingConfig::merge_with_defaults(&Value::Null))
        }
    }
}

pub fn resolve_logs(result: Result<Vec<LogLine>, GatewayError>) -> Resolved<Vec<LogLine>> {
    match result {
        Ok(lines) => Resolved::live(lines),
        Err(e) => {
            warn!("Logs unavailable ({}), showing none", e);
            Resolved::degraded(Vec::new())
        }
    }
}

/// Keep-alive only cares whether the probe answered 2xx.
pub fn resolve_health(result: Result<(), GatewayError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("Keep-alive ping failed: {}", e);
            false
        }
    }
}

pub fn surface<T>(result: Result<T, GatewayError>) -> Result<T, SurfacedError> {
    result.map_err(SurfacedError::from)
}

/// A transport failure on test-connection becomes an error report rather than an `Err`.
pub fn resolve_test_connection(
    result: Result<TestConnectionReport, GatewayError>,
) -> TestConnectionReport {
    match result {
        Ok(report) => report,
        Err(e) => {
            warn!("Test connection failed: {}", e);
            let message = if e.is_network() {
                format!("Could not reach the bot backend: {}", e)
            } else {
                format!("Bot backend rejected the connection test: {}", e)
            };
            TestConnectionReport::failed(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{BotApi, HttpGateway};
    use crate::test_utils::{live_balance, spawn_backend};
    use crate::types::ConnectionStatus;
    use axum::{routing::get, Router};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_balance_500_gives_simulated_snapshot() {
        let resolved = resolve_balance(Err(GatewayError::backend(Some(500), "boom")));
        assert!(resolved.degraded);

        let b = resolved.value;
        assert_eq!(b.total_balance, 1000.0);
        assert_eq!(b.available_balance, 850.0);
        assert_eq!(b.used_balance, 150.0);
        assert_eq!(b.unrealized_pnl, 25.5);
        assert_eq!(b.total_wallet_balance, 1025.5);
        assert_eq!(b.currency, "USDT");
    }

    #[test]
    fn test_live_balance_passes_through() {
        let resolved = resolve_balance(Ok(live_balance()));
        assert!(!resolved.degraded);
        assert_eq!(resolved.value, live_balance());
    }

    #[test]
    fn test_config_fallback_and_partial() {
        let down = resolve_config(Err(GatewayError::network("refused")));
        assert!(down.degraded);
        assert_eq!(down.value, TradingConfig::default());

        let partial = resolve_config(Ok(json!({"leverage": 20})));
        assert!(!partial.degraded);
        assert_eq!(partial.value.leverage, 20);
        assert_eq!(partial.value.limit, 100);
        assert_eq!(partial.value.risk_reward_ratio, 2.0);
    }

    #[test]
    fn test_surfaced_error_shape() {
        let err = surface::<()>(Err(GatewayError::network("connection refused"))).unwrap_err();
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"error": "network: connection refused"})
        );
    }

    #[test]
    fn test_logs_and_health_fallbacks() {
        let logs = resolve_logs(Err(GatewayError::network("x")));
        assert!(logs.degraded);
        assert!(logs.value.is_empty());

        assert!(resolve_health(Ok(())));
        assert!(!resolve_health(Err(GatewayError::backend(Some(503), "down"))));
    }

    #[test]
    fn test_connection_transport_failure_is_error_report() {
        let report = resolve_test_connection(Err(GatewayError::network("refused")));
        assert_eq!(report.status, ConnectionStatus::Error);
        assert!(report.balance.is_none());
        assert!(report.message.unwrap().contains("refused"));

        let rejected = resolve_test_connection(Err(GatewayError::backend(Some(500), "no api key")));
        assert_eq!(rejected.status, ConnectionStatus::Error);
        let message = rejected.message.unwrap();
        assert!(message.starts_with("Bot backend rejected"));
        assert!(message.contains("no api key"));
    }

    #[tokio::test]
    async fn test_plain_text_keep_alive_counts_as_alive() {
        let app = Router::new().route("/health", get(|| async { "OK" }));
        let base = spawn_backend(app).await;
        let gateway = HttpGateway::with_urls(
            &base,
            &format!("{}/health", base),
            Duration::from_secs(2),
        )
        .unwrap();
        let api = BotApi::new(Arc::new(gateway));

        assert!(resolve_health(api.health().await));
    }
}

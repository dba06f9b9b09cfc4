use serde::{Deserialize, Serialize};

use super::BalanceSnapshot;

/// Acknowledgement body returned by start/stop/close/config-save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionAck {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub order_id: Option<serde_json::Value>,
}

impl std::fmt::Display for ActionAck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.message, &self.order_id) {
            (Some(msg), Some(id)) => write!(f, "{} (order {})", msg, id),
            (Some(msg), None) => write!(f, "{}", msg),
            (None, Some(id)) => write!(f, "ok (order {})", id),
            (None, None) => write!(f, "ok"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Success,
    Error,
}

/// Body of `POST /test-connection`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestConnectionReport {
    pub status: ConnectionStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub balance: Option<BalanceSnapshot>,
}

impl TestConnectionReport {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ConnectionStatus::Error,
            message: Some(message.into()),
            balance: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ConnectionStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_with_balance() {
        let report: TestConnectionReport = serde_json::from_value(json!({
            "status": "success",
            "message": "ok",
            "balance": {
                "total_balance": 10.0,
                "available_balance": 5.0,
                "used_balance": 5.0,
                "unrealized_pnl": 0.0,
                "total_wallet_balance": 10.0,
                "currency": "USDT",
                "margin_ratio": 3.2
            }
        }))
        .unwrap();
        assert!(report.is_success());
        assert_eq!(report.balance.unwrap().margin_ratio, Some(3.2));
    }

    #[test]
    fn test_ack_display() {
        let ack: ActionAck = serde_json::from_value(json!({
            "message": "closed",
            "order_id": 42
        }))
        .unwrap();
        assert_eq!(ack.to_string(), "closed (order 42)");
        assert_eq!(ActionAck::default().to_string(), "ok");
    }
}

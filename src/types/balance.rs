use serde::{Deserialize, Serialize};

/// Account balance figures from the bot's `/balance` endpoint.
///
/// `total_wallet_balance` is informational and need not equal `available + used`.
/// An absent `margin_ratio` means the margin banding is unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub total_balance: f64,
    pub available_balance: f64,
    pub used_balance: f64,
    pub unrealized_pnl: f64,
    pub total_wallet_balance: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_ratio: Option<f64>,
}

impl BalanceSnapshot {
    /// The "healthy" badge on the balance card lights up while free funds exceed funds in use.
    pub fn is_healthy(&self) -> bool {
        self.available_balance > self.used_balance
    }

    pub fn pnl_is_positive(&self) -> bool {
        self.unrealized_pnl >= 0.0
    }
}

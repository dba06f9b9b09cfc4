//! Percentage risk indicators derived from a [`BalanceSnapshot`].
//!
//! Every function returns a finite value: a zero, negative, or non-finite denominator
//! yields 0.0 and a missing margin ratio yields [`MarginStatus::Unknown`].
use serde::Serialize;

use crate::types::BalanceSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UtilizationBand {
    Safe,
    Caution,
    Critical,
}

impl UtilizationBand {
    pub fn from_percent(percent: f64) -> Self {
        if percent < 50.0 {
            UtilizationBand::Safe
        } else if percent < 80.0 {
            UtilizationBand::Caution
        } else {
            UtilizationBand::Critical
        }
    }
}

/// Banding of the backend-supplied margin ratio. Thresholds mirror the utilization bands
/// by convention only; the two measure different ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginStatus {
    Unknown,
    Safe,
    Warning,
    Danger,
}

impl MarginStatus {
    pub fn label(&self) -> &'static str {
        match self {
            MarginStatus::Safe => "Healthy",
            MarginStatus::Warning => "Caution",
            MarginStatus::Danger => "High Risk",
            MarginStatus::Unknown => "Normal",
        }
    }
}

fn share_of_total(part: f64, total: f64) -> f64 {
    if !(total > 0.0) || !total.is_finite() || !part.is_finite() {
        return 0.0;
    }
    part / total * 100.0
}

pub fn free_margin_percent(balance: &BalanceSnapshot) -> f64 {
    share_of_total(balance.available_balance, balance.total_balance)
}

pub fn utilization_percent(balance: &BalanceSnapshot) -> f64 {
    share_of_total(balance.used_balance, balance.total_balance)
}

/// Width of the utilization bar, capped at a full bar.
pub fn utilization_bar_width(balance: &BalanceSnapshot) -> f64 {
    utilization_percent(balance).clamp(0.0, 100.0)
}

pub fn margin_status(margin_ratio: Option<f64>) -> MarginStatus {
    match margin_ratio {
        Some(ratio) if ratio.is_finite() => {
            if ratio < 50.0 {
                MarginStatus::Safe
            } else if ratio < 80.0 {
                MarginStatus::Warning
            } else {
                MarginStatus::Danger
            }
        }
        _ => MarginStatus::Unknown,
    }
}

/// All derived figures for one snapshot, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskIndicators {
    pub free_margin_percent: f64,
    pub utilization_percent: f64,
    pub utilization_bar_width: f64,
    pub utilization_band: UtilizationBand,
    pub margin_status: MarginStatus,
    pub healthy: bool,
}

impl RiskIndicators {
    pub fn from_balance(balance: &BalanceSnapshot) -> Self {
        let utilization = utilization_percent(balance);
        Self {
            free_margin_percent: free_margin_percent(balance),
            utilization_percent: utilization,
            utilization_bar_width: utilization_bar_width(balance),
            utilization_band: UtilizationBand::from_percent(utilization),
            margin_status: margin_status(balance.margin_ratio),
            healthy: balance.is_healthy(),
        }
    }
}

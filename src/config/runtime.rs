use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Trading parameters the bot exposes on `/config`.
///
/// The dashboard's working copy never has an unset field: anything the backend omits,
/// nulls, or mistypes is filled from [`TradingConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingConfig {
    pub limit: u32,
    pub leverage: u32,
    pub risk_per_trade_percent: f64,
    pub max_risk_usdt_per_trade: f64,
    pub test_mode: bool,
    pub kline_interval_minutes: u32,
    pub kline_trend_period: u32,
    pub kline_pullback_period: u32,
    pub kline_atr_period: u32,
    pub min_atr_multiplier_for_entry: f64,
    pub max_symbols_to_monitor: u32,
    pub risk_reward_ratio: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            leverage: 15,
            risk_per_trade_percent: 0.5,
            max_risk_usdt_per_trade: 1.0,
            test_mode: true,
            kline_interval_minutes: 5,
            kline_trend_period: 50,
            kline_pullback_period: 10,
            kline_atr_period: 14,
            min_atr_multiplier_for_entry: 1.5,
            max_symbols_to_monitor: 5,
            risk_reward_ratio: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Float,
    Flag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigField {
    Limit,
    Leverage,
    RiskPerTradePercent,
    MaxRiskUsdtPerTrade,
    TestMode,
    KlineIntervalMinutes,
    KlineTrendPeriod,
    KlinePullbackPeriod,
    KlineAtrPeriod,
    MinAtrMultiplierForEntry,
    MaxSymbolsToMonitor,
    RiskRewardRatio,
}

impl ConfigField {
    pub const ALL: [ConfigField; 12] = [
        ConfigField::Limit,
        ConfigField::Leverage,
        ConfigField::RiskPerTradePercent,
        ConfigField::MaxRiskUsdtPerTrade,
        ConfigField::TestMode,
        ConfigField::KlineIntervalMinutes,
        ConfigField::KlineTrendPeriod,
        ConfigField::KlinePullbackPeriod,
        ConfigField::KlineAtrPeriod,
        ConfigField::MinAtrMultiplierForEntry,
        ConfigField::MaxSymbolsToMonitor,
        ConfigField::RiskRewardRatio,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Limit => "limit",
            Self::Leverage => "leverage",
            Self::RiskPerTradePercent => "risk_per_trade_percent",
            Self::MaxRiskUsdtPerTrade => "max_risk_usdt_per_trade",
            Self::TestMode => "test_mode",
            Self::KlineIntervalMinutes => "kline_interval_minutes",
            Self::KlineTrendPeriod => "kline_trend_period",
            Self::KlinePullbackPeriod => "kline_pullback_period",
            Self::KlineAtrPeriod => "kline_atr_period",
            Self::MinAtrMultiplierForEntry => "min_atr_multiplier_for_entry",
            Self::MaxSymbolsToMonitor => "max_symbols_to_monitor",
            Self::RiskRewardRatio => "risk_reward_ratio",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::TestMode => FieldKind::Flag,
            Self::RiskPerTradePercent
            | Self::MaxRiskUsdtPerTrade
            | Self::MinAtrMultiplierForEntry
            | Self::RiskRewardRatio => FieldKind::Float,
            _ => FieldKind::Integer,
        }
    }
}

impl std::fmt::Display for ConfigField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfigField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.name() == s)
            .ok_or_else(|| ValidationError::UnknownField(s.to_string()))
    }
}

/// Locally caught bad input while editing the working copy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("unknown config field: {0}")]
    UnknownField(String),
    #[error("{field}: '{input}' is not a number, using 0")]
    NotANumber { field: ConfigField, input: String },
    #[error("{field}: '{input}' is not a whole non-negative number, using 0")]
    NotAnInteger { field: ConfigField, input: String },
    #[error("{field}: '{input}' is not true/false")]
    NotAFlag { field: ConfigField, input: String },
}

impl TradingConfig {
    /// Canonical default filling, applied on fetch and on fallback.
    pub fn merge_with_defaults(raw: &Value) -> Self {
        Self::default().merged_onto(raw)
    }

    /// Overlays whichever fields `raw` carries with a usable value; everything else keeps
    /// `self`. A save echo is merged onto the config that was sent.
    pub fn merged_onto(&self, raw: &Value) -> Self {
        let mut config = self.clone();
        for field in ConfigField::ALL {
            if let Some(value) = raw.get(field.name()) {
                if !config.merge_field(field, value) && !value.is_null() {
                    warn!(
                        "{}: ignoring backend value {}, keeping {}",
                        field,
                        value,
                        config.field_value(field)
                    );
                }
            }
        }
        config
    }

    /// Returns false when `value` has no usable reading for the field's kind.
    fn merge_field(&mut self, field: ConfigField, value: &Value) -> bool {
        match field.kind() {
            FieldKind::Integer => match value_as_u32(value) {
                Some(n) => {
                    self.set_integer(field, n);
                    true
                }
                None => false,
            },
            FieldKind::Float => match value.as_f64().filter(|n| n.is_finite()) {
                Some(n) => {
                    self.set_float(field, n);
                    true
                }
                None => false,
            },
            FieldKind::Flag => match value.as_bool() {
                Some(b) => {
                    self.test_mode = b;
                    true
                }
                None => false,
            },
        }
    }

    /// Applies an operator-typed value. Numeric input that fails to parse is stored as 0
    /// and reported back; a bad flag leaves the field unchanged.
    pub fn apply_input(&mut self, field: ConfigField, raw: &str) -> Option<ValidationError> {
        let input = raw.trim();
        match field.kind() {
            FieldKind::Integer => {
                let parsed = if input.is_empty() {
                    Ok(0)
                } else {
                    parse_integer_input(field, input)
                };
                match parsed {
                    Ok(n) => {
                        self.set_integer(field, n);
                        None
                    }
                    Err(e) => {
                        self.set_integer(field, 0);
                        Some(e)
                    }
                }
            }
            FieldKind::Float => match input.parse::<f64>() {
                Ok(n) if n.is_finite() => {
                    self.set_float(field, n);
                    None
                }
                _ if input.is_empty() => {
                    self.set_float(field, 0.0);
                    None
                }
                _ => {
                    self.set_float(field, 0.0);
                    Some(ValidationError::NotANumber {
                        field,
                        input: input.to_string(),
                    })
                }
            },
            FieldKind::Flag => match input.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => {
                    self.test_mode = true;
                    None
                }
                "false" | "0" | "off" | "no" => {
                    self.test_mode = false;
                    None
                }
                _ => Some(ValidationError::NotAFlag {
                    field,
                    input: input.to_string(),
                }),
            },
        }
    }

    pub fn field_value(&self, field: ConfigField) -> Value {
        match field {
            ConfigField::Limit => self.limit.into(),
            ConfigField::Leverage => self.leverage.into(),
            ConfigField::RiskPerTradePercent => self.risk_per_trade_percent.into(),
            ConfigField::MaxRiskUsdtPerTrade => self.max_risk_usdt_per_trade.into(),
            ConfigField::TestMode => self.test_mode.into(),
            ConfigField::KlineIntervalMinutes => self.kline_interval_minutes.into(),
            ConfigField::KlineTrendPeriod => self.kline_trend_period.into(),
            ConfigField::KlinePullbackPeriod => self.kline_pullback_period.into(),
            ConfigField::KlineAtrPeriod => self.kline_atr_period.into(),
            ConfigField::MinAtrMultiplierForEntry => self.min_atr_multiplier_for_entry.into(),
            ConfigField::MaxSymbolsToMonitor => self.max_symbols_to_monitor.into(),
            ConfigField::RiskRewardRatio => self.risk_reward_ratio.into(),
        }
    }

    fn set_integer(&mut self, field: ConfigField, n: u32) {
        match field {
            ConfigField::Limit => self.limit = n,
            ConfigField::Leverage => self.leverage = n,
            ConfigField::KlineIntervalMinutes => self.kline_interval_minutes = n,
            ConfigField::KlineTrendPeriod => self.kline_trend_period = n,
            ConfigField::KlinePullbackPeriod => self.kline_pullback_period = n,
            ConfigField::KlineAtrPeriod => self.kline_atr_period = n,
            ConfigField::MaxSymbolsToMonitor => self.max_symbols_to_monitor = n,
            _ => {}
        }
    }

    fn set_float(&mut self, field: ConfigField, n: f64) {
        match field {
            ConfigField::RiskPerTradePercent => self.risk_per_trade_percent = n,
            ConfigField::MaxRiskUsdtPerTrade => self.max_risk_usdt_per_trade = n,
            ConfigField::MinAtrMultiplierForEntry => self.min_atr_multiplier_for_entry = n,
            ConfigField::RiskRewardRatio => self.risk_reward_ratio = n,
            _ => {}
        }
    }

    /// Sanity warnings shown before a save. Never blocks the save.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.leverage == 0 || self.leverage > 125 {
            errors.push("leverage must be between 1 and 125".to_string());
        }
        if self.risk_per_trade_percent <= 0.0 || self.risk_per_trade_percent > 100.0 {
            errors.push("risk_per_trade_percent must be between 0 and 100%".to_string());
        }
        if self.max_risk_usdt_per_trade <= 0.0 {
            errors.push("max_risk_usdt_per_trade must be > 0".to_string());
        }
        if self.kline_interval_minutes == 0 {
            errors.push("kline_interval_minutes must be > 0".to_string());
        }
        if self.kline_pullback_period >= self.kline_trend_period {
            errors.push("kline_pullback_period must be < kline_trend_period".to_string());
        }
        if self.max_symbols_to_monitor == 0 {
            errors.push("max_symbols_to_monitor must be > 0".to_string());
        }
        if self.risk_reward_ratio <= 0.0 {
            errors.push("risk_reward_ratio must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn value_as_u32(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    value
        .as_f64()
        .filter(|n| n.is_finite() && *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64)
        .map(|n| n as u32)
}

fn parse_integer_input(field: ConfigField, input: &str) -> Result<u32, ValidationError> {
    let number = input.parse::<f64>().map_err(|_| ValidationError::NotANumber {
        field,
        input: input.to_string(),
    })?;
    value_as_u32(&Value::from(number)).ok_or_else(|| ValidationError::NotAnInteger {
        field,
        input: input.to_string(),
    })
}

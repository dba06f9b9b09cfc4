use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Process status as reported by the bot's `/status` endpoint.
///
/// Always replaced wholesale on every resolved poll, never patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotStatus {
    pub running: bool,
    #[serde(default, deserialize_with = "deserialize_start_time")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub uptime: Option<String>,
    #[serde(default)]
    pub positions_count: u32,
    #[serde(default = "default_test_mode")]
    pub test_mode: bool,
}

fn default_test_mode() -> bool {
    true
}

impl Default for BotStatus {
    fn default() -> Self {
        Self {
            running: false,
            start_time: None,
            uptime: None,
            positions_count: 0,
            test_mode: true,
        }
    }
}

impl BotStatus {
    pub fn uptime_display(&self) -> &str {
        self.uptime.as_deref().unwrap_or("0h 0m")
    }

    pub fn mode_label(&self) -> &'static str {
        if self.test_mode {
            "TEST"
        } else {
            "LIVE"
        }
    }

    pub fn state_label(&self) -> &'static str {
        if self.running {
            "RUNNING"
        } else {
            "STOPPED"
        }
    }
}

impl std::fmt::Display for BotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] uptime={} positions={}",
            self.state_label(),
            self.mode_label(),
            self.uptime_display(),
            self.positions_count
        )
    }
}

/// The bot reports `start_time` as an epoch float even though it is documented as a
/// string, so accept RFC3339, epoch seconds, or epoch seconds in a string.
fn deserialize_start_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value {
        serde_json::Value::Number(n) => n.as_f64().and_then(epoch_seconds),
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<f64>().ok().and_then(epoch_seconds)),
        _ => None,
    }))
}

fn epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt((secs * 1000.0) as i64).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_time_formats() {
        let from_float: BotStatus = serde_json::from_value(json!({
            "running": true,
            "start_time": 1700000000.5,
            "uptime": "1h 2m",
            "positions_count": 2,
            "test_mode": false
        }))
        .unwrap();
        assert_eq!(from_float.start_time.unwrap().timestamp(), 1_700_000_000);

        let from_rfc: BotStatus = serde_json::from_value(json!({
            "running": true,
            "start_time": "2024-01-01T00:00:00Z",
            "positions_count": 0,
            "test_mode": true
        }))
        .unwrap();
        assert_eq!(from_rfc.start_time.unwrap().timestamp(), 1_704_067_200);

        let from_str: BotStatus = serde_json::from_value(json!({
            "running": false,
            "start_time": "1700000000.0",
            "positions_count": 0,
            "test_mode": true
        }))
        .unwrap();
        assert!(from_str.start_time.is_some());
    }

    #[test]
    fn test_null_optionals() {
        let status: BotStatus = serde_json::from_value(json!({
            "running": false,
            "start_time": null,
            "uptime": null,
            "positions_count": 0,
            "test_mode": true
        }))
        .unwrap();
        assert!(status.start_time.is_none());
        assert_eq!(status.uptime_display(), "0h 0m");
        assert_eq!(status.state_label(), "STOPPED");
    }
}

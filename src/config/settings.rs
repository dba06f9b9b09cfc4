use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::poller::{
    BALANCE_INTERVAL, HEALTH_INTERVAL, LOGS_INTERVAL, POSITIONS_INTERVAL, STATUS_INTERVAL,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const ENV_PREFIX: &str = "DASHBOARD";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("polling interval '{0}' must be > 0")]
    ZeroInterval(&'static str),
    #[error("backend.request_timeout_secs must be > 0")]
    ZeroTimeout,
}

/// Application settings, layered: built-in defaults, then an optional TOML file, then
/// `DASHBOARD__SECTION__KEY` environment variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend: BackendSettings,
    pub polling: PollingSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub base_url: String,
    /// Keep-alive target. Falls back to `<base_url>/health`.
    pub health_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            health_url: None,
            request_timeout_secs: 10,
        }
    }
}

impl BackendSettings {
    pub fn health_url(&self) -> String {
        match &self.health_url {
            Some(url) => url.clone(),
            None => format!("{}/health", self.base_url.trim_end_matches('/')),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Per-resource poll periods in milliseconds. Independent constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub status_ms: u64,
    pub positions_ms: u64,
    pub balance_ms: u64,
    pub logs_ms: u64,
    pub health_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            status_ms: STATUS_INTERVAL.as_millis() as u64,
            positions_ms: POSITIONS_INTERVAL.as_millis() as u64,
            balance_ms: BALANCE_INTERVAL.as_millis() as u64,
            logs_ms: LOGS_INTERVAL.as_millis() as u64,
            health_ms: HEALTH_INTERVAL.as_millis() as u64,
        }
    }
}

impl PollingSettings {
    pub fn status(&self) -> Duration {
        Duration::from_millis(self.status_ms)
    }

    pub fn positions(&self) -> Duration {
        Duration::from_millis(self.positions_ms)
    }

    pub fn balance(&self) -> Duration {
        Duration::from_millis(self.balance_ms)
    }

    pub fn logs(&self) -> Duration {
        Duration::from_millis(self.logs_ms)
    }

    pub fn health(&self) -> Duration {
        Duration::from_millis(self.health_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

impl Settings {
    /// Loads `path` if it exists, then overlays environment variables.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let cfg = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    #[cfg(test)]
    pub fn from_toml_str(source: &str) -> Result<Self, SettingsError> {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;

        let settings: Settings = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        check_url(&self.backend.base_url)?;
        check_url(&self.backend.health_url())?;
        if self.backend.request_timeout_secs == 0 {
            return Err(SettingsError::ZeroTimeout);
        }

        let intervals = [
            ("status_ms", self.polling.status_ms),
            ("positions_ms", self.polling.positions_ms),
            ("balance_ms", self.polling.balance_ms),
            ("logs_ms", self.polling.logs_ms),
            ("health_ms", self.polling.health_ms),
        ];
        for (name, ms) in intervals {
            if ms == 0 {
                return Err(SettingsError::ZeroInterval(name));
            }
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn check_url(raw: &str) -> Result<(), SettingsError> {
    let url = Url::parse(raw).map_err(|e| SettingsError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(SettingsError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings.backend.base_url, "http://localhost:8000");
        assert_eq!(settings.backend.health_url(), "http://localhost:8000/health");
        assert_eq!(settings.polling.status(), Duration::from_secs(5));
        assert_eq!(settings.polling.positions(), Duration::from_secs(5));
        assert_eq!(settings.polling.balance(), Duration::from_secs(10));
        assert_eq!(settings.polling.logs(), Duration::from_secs(10));
        assert_eq!(settings.polling.health(), Duration::from_secs(600));
        assert_eq!(settings.server.port, 3000);
    }

    #[test]
    fn test_partial_file_overrides() {
        let settings = Settings::from_toml_str(
            r#"
            [backend]
            base_url = "http://bot.internal:9000/"
            health_url = "http://localhost:3000/api/health"

            [polling]
            balance_ms = 2500
            "#,
        )
        .unwrap();

        assert_eq!(settings.backend.base_url, "http://bot.internal:9000/");
        assert_eq!(settings.backend.health_url(), "http://localhost:3000/api/health");
        assert_eq!(settings.polling.balance_ms, 2500);
        assert_eq!(settings.polling.status_ms, 5_000);
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad_url = Settings::from_toml_str("[backend]\nbase_url = \"ftp://x\"");
        assert!(matches!(bad_url, Err(SettingsError::InvalidUrl { .. })));

        let zero = Settings::from_toml_str("[polling]\nstatus_ms = 0");
        assert!(matches!(zero, Err(SettingsError::ZeroInterval("status_ms"))));

        let no_timeout = Settings::from_toml_str("[backend]\nrequest_timeout_secs = 0");
        assert!(matches!(no_timeout, Err(SettingsError::ZeroTimeout)));
    }

    #[test]
    fn test_missing_file_is_tolerated() {
        let settings = Settings::load(Path::new("/nonexistent/dashboard.toml")).unwrap();
        assert_eq!(settings.backend.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_toml_render() {
        let rendered = Settings::default().to_toml().unwrap();
        assert!(rendered.contains("[polling]"));
        assert!(rendered.contains("health_ms = 600000"));
    }
}

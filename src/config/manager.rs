use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use super::runtime::{ConfigField, TradingConfig, ValidationError};
use crate::resilience::Resolved;

#[derive(Debug, Clone, Serialize)]
pub enum ConfigChangeEvent {
    Loaded { degraded: bool },
    FieldEdited { field: ConfigField, value: serde_json::Value },
    Saved,
}

#[derive(Debug)]
struct WorkingCopy {
    config: TradingConfig,
    /// Set while the copy is built from defaults because the bot could not be read.
    degraded: bool,
}

/// Owns the client-side working copy of the bot's trading config.
///
/// The copy is always fully populated; edits land here and are only sent to the bot on save.
pub struct ConfigManager {
    working: Arc<RwLock<WorkingCopy>>,
    change_tx: broadcast::Sender<ConfigChangeEvent>,
}

impl ConfigManager {
    pub fn new(initial: TradingConfig) -> Self {
        let (change_tx, _) = broadcast::channel(32);
        Self {
            working: Arc::new(RwLock::new(WorkingCopy {
                config: initial,
                degraded: false,
            })),
            change_tx,
        }
    }

    pub async fn get_config(&self) -> TradingConfig {
        self.working.read().await.config.clone()
    }

    /// Config and degraded flag read together.
    pub async fn working_copy(&self) -> Resolved<TradingConfig> {
        let working = self.working.read().await;
        Resolved {
            value: working.config.clone(),
            degraded: working.degraded,
        }
    }

    /// Replaces the working copy with a fetched (or defaulted) config.
    pub async fn load(&self, resolved: Resolved<TradingConfig>) {
        *self.working.write().await = WorkingCopy {
            config: resolved.value,
            degraded: resolved.degraded,
        };

        if resolved.degraded {
            warn!("Config unavailable from bot, editing defaults");
        } else {
            info!("Config loaded from bot");
        }
        let _ = self.change_tx.send(ConfigChangeEvent::Loaded {
            degraded: resolved.degraded,
        });
    }

    pub async fn edit(&self, field: ConfigField, raw: &str) -> Option<ValidationError> {
        let mut working = self.working.write().await;
        let problem = working.config.apply_input(field, raw);
        let value = working.config.field_value(field);

        if let Some(e) = &problem {
            warn!("{}", e);
        }
        info!("Config field {} set to {}", field, value);
        let _ = self.change_tx.send(ConfigChangeEvent::FieldEdited { field, value });
        problem
    }

    pub async fn mark_saved(&self, echoed: TradingConfig) {
        *self.working.write().await = WorkingCopy {
            config: echoed,
            degraded: false,
        };

        info!("Config saved to bot");
        let _ = self.change_tx.send(ConfigChangeEvent::Saved);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChangeEvent> {
        self.change_tx.subscribe()
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new(TradingConfig::default())
    }
}

impl Clone for ConfigManager {
    fn clone(&self) -> Self {
        Self {
            working: Arc::clone(&self.working),
            change_tx: self.change_tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_edit_reports_and_broadcasts() {
        let manager = ConfigManager::default();
        let mut rx = manager.subscribe();

        let problem = manager.edit(ConfigField::Leverage, "ten").await;
        assert!(problem.is_some());
        assert_eq!(manager.get_config().await.leverage, 0);

        match rx.recv().await.unwrap() {
            ConfigChangeEvent::FieldEdited { field, value } => {
                assert_eq!(field, ConfigField::Leverage);
                assert_eq!(value, serde_json::json!(0));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_degraded_load_then_save_clears_flag() {
        let manager = ConfigManager::default();
        manager.load(Resolved::degraded(TradingConfig::default())).await;
        assert!(manager.working_copy().await.degraded);

        let echoed = TradingConfig {
            leverage: 10,
            ..TradingConfig::default()
        };
        manager.mark_saved(echoed).await;
        assert!(!manager.working_copy().await.degraded);
        assert_eq!(manager.get_config().await.leverage, 10);
    }

    #[tokio::test]
    async fn test_clones_see_one_working_copy() {
        let manager = ConfigManager::default();
        let reader = manager.clone();

        let fetched = TradingConfig {
            leverage: 25,
            ..TradingConfig::default()
        };
        manager.load(Resolved::degraded(fetched)).await;
        manager.edit(ConfigField::Limit, "40").await;

        let copy = reader.working_copy().await;
        assert!(copy.degraded);
        assert_eq!(copy.value.leverage, 25);
        assert_eq!(copy.value.limit, 40);

        manager.load(Resolved::live(TradingConfig::default())).await;
        let copy = reader.working_copy().await;
        assert!(!copy.degraded);
        assert_eq!(copy.value, TradingConfig::default());
    }
}

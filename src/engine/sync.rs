use tracing::{info, warn};

use crate::config::{ConfigField, ConfigManager, PollingSettings, TradingConfig, ValidationError};
use crate::gateway::BotApi;
use crate::poller::Poller;
use crate::resilience::{
    resolve_balance, resolve_config, resolve_health, resolve_logs, resolve_test_connection,
    surface, Resolved, SurfacedError,
};
use crate::types::{ActionAck, TestConnectionReport};
use crate::web::{ApplyOutcome, ResourceKind, ViewState};

/// Keeps the [`ViewState`] in sync with the bot.
///
/// Owns one poller per resource while active. Fallbacks are applied between the gateway
/// and the view, so the pollers only ever see resolved values. Operator actions go through
/// the same boundary and are never retried here.
pub struct DashboardSync {
    api: BotApi,
    view: ViewState,
    config: ConfigManager,
    intervals: PollingSettings,
    pollers: Vec<Poller>,
}

impl DashboardSync {
    pub fn new(
        api: BotApi,
        view: ViewState,
        config: ConfigManager,
        intervals: PollingSettings,
    ) -> Self {
        Self {
            api,
            view,
            config,
            intervals,
            pollers: Vec::new(),
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.pollers.iter().any(Poller::is_active)
    }

    /// Starts every poller. Each fires its first call right away.
    pub fn activate(&mut self) {
        if self.is_active() {
            return;
        }

        self.pollers = vec![
            self.status_poller(),
            self.positions_poller(),
            self.balance_poller(),
            self.logs_poller(),
            self.health_poller(),
        ];
        info!("Dashboard sync active with {} pollers", self.pollers.len());
    }

    /// Stops all scheduling. Calls already in flight finish but never reach the view.
    pub fn deactivate(&mut self) {
        if !self.is_active() {
            return;
        }
        for poller in self.pollers.iter_mut() {
            poller.stop();
        }
        self.pollers.clear();
        info!("Dashboard sync stopped");
    }

    fn status_poller(&self) -> Poller {
        let api = self.api.clone();
        let issuer = self.view.clone();
        let view = self.view.clone();
        Poller::spawn(
            "status",
            self.intervals.status(),
            move || {
                let api = api.clone();
                let seq = issuer.next_seq(ResourceKind::Status);
                async move { (seq, fetch_surfaced("status", api.status().await)) }
            },
            move |ticket, (seq, result)| {
                let view = view.clone();
                async move {
                    view.apply_status(seq, Some(&ticket), result).await;
                }
            },
        )
    }

    fn positions_poller(&self) -> Poller {
        let api = self.api.clone();
        let issuer = self.view.clone();
        let view = self.view.clone();
        Poller::spawn(
            "positions",
            self.intervals.positions(),
            move || {
                let api = api.clone();
                let seq = issuer.next_seq(ResourceKind::Positions);
                async move { (seq, fetch_surfaced("positions", api.positions().await)) }
            },
            move |ticket, (seq, result)| {
                let view = view.clone();
                async move {
                    view.apply_positions(seq, Some(&ticket), result).await;
                }
            },
        )
    }

    fn balance_poller(&self) -> Poller {
        let api = self.api.clone();
        let issuer = self.view.clone();
        let view = self.view.clone();
        Poller::spawn(
            "balance",
            self.intervals.balance(),
            move || {
                let api = api.clone();
                let seq = issuer.next_seq(ResourceKind::Balance);
                async move { (seq, resolve_balance(api.balance().await)) }
            },
            move |ticket, (seq, resolved)| {
                let view = view.clone();
                async move {
                    view.apply_balance(seq, Some(&ticket), resolved).await;
                }
            },
        )
    }

    fn logs_poller(&self) -> Poller {
        let api = self.api.clone();
        let issuer = self.view.clone();
        let view = self.view.clone();
        Poller::spawn(
            "logs",
            self.intervals.logs(),
            move || {
                let api = api.clone();
                let seq = issuer.next_seq(ResourceKind::Logs);
                async move { (seq, resolve_logs(api.logs().await)) }
            },
            move |ticket, (seq, resolved)| {
                let view = view.clone();
                async move {
                    view.apply_logs(seq, Some(&ticket), resolved).await;
                }
            },
        )
    }

    fn health_poller(&self) -> Poller {
        let api = self.api.clone();
        let issuer = self.view.clone();
        let view = self.view.clone();
        Poller::spawn(
            "health",
            self.intervals.health(),
            move || {
                let api = api.clone();
                let seq = issuer.next_seq(ResourceKind::Health);
                async move { (seq, resolve_health(api.health().await)) }
            },
            move |ticket, (seq, alive)| {
                let view = view.clone();
                async move {
                    view.apply_health(seq, Some(&ticket), alive).await;
                }
            },
        )
    }

    pub async fn refresh_status(&self) -> ApplyOutcome {
        let seq = self.view.next_seq(ResourceKind::Status);
        let result = fetch_surfaced("status", self.api.status().await);
        self.view.apply_status(seq, None, result).await
    }

    pub async fn refresh_positions(&self) -> ApplyOutcome {
        let seq = self.view.next_seq(ResourceKind::Positions);
        let result = fetch_surfaced("positions", self.api.positions().await);
        self.view.apply_positions(seq, None, result).await
    }

    pub async fn refresh_balance(&self) -> ApplyOutcome {
        let seq = self.view.next_seq(ResourceKind::Balance);
        let resolved = resolve_balance(self.api.balance().await);
        self.view.apply_balance(seq, None, resolved).await
    }

    pub async fn refresh_logs(&self) -> ApplyOutcome {
        let seq = self.view.next_seq(ResourceKind::Logs);
        let resolved = resolve_logs(self.api.logs().await);
        self.view.apply_logs(seq, None, resolved).await
    }

    pub async fn start_bot(&self) -> Result<ActionAck, SurfacedError> {
        let ack = surface(self.api.start().await);
        match &ack {
            Ok(ack) => {
                info!("Start acknowledged: {}", ack);
                self.refresh_status().await;
            }
            Err(e) => warn!("Start failed: {}", e),
        }
        ack
    }

    pub async fn stop_bot(&self) -> Result<ActionAck, SurfacedError> {
        let ack = surface(self.api.stop().await);
        match &ack {
            Ok(ack) => {
                info!("Stop acknowledged: {}", ack);
                self.refresh_status().await;
            }
            Err(e) => warn!("Stop failed: {}", e),
        }
        ack
    }

    /// Requests a close. The position stays in the view until a positions poll omits it.
    pub async fn close_position(&self, symbol: &str) -> Result<ActionAck, SurfacedError> {
        let ack = surface(self.api.close_position(symbol).await);
        match &ack {
            Ok(ack) => {
                info!("Close {} acknowledged: {}", symbol, ack);
                let refreshed = self.refresh_positions().await;
                if refreshed.is_applied() && self.view.has_position(symbol).await {
                    info!("{} still listed by the bot, waiting for a later poll", symbol);
                }
            }
            Err(e) => warn!("Close {} failed: {}", symbol, e),
        }
        ack
    }

    /// A successful report carrying a balance replaces the view balance with it.
    pub async fn test_connection(&self) -> TestConnectionReport {
        let report = resolve_test_connection(self.api.test_connection().await);

        if report.is_success() {
            if let Some(balance) = report.balance.clone() {
                let seq = self.view.next_seq(ResourceKind::Balance);
                self.view
                    .apply_balance(seq, None, Resolved::live(balance))
                    .await;
            }
            info!("Test connection succeeded");
        } else {
            warn!("Test connection reported error: {:?}", report.message);
        }
        report
    }

    pub async fn load_config(&self) -> Resolved<TradingConfig> {
        let resolved = resolve_config(self.api.config().await);
        self.config.load(resolved.clone()).await;
        resolved
    }

    pub async fn edit_config(&self, field: ConfigField, raw: &str) -> Option<ValidationError> {
        self.config.edit(field, raw).await
    }

    /// Sends the full working copy. The echoed config is merged onto what was sent.
    pub async fn save_config(&self) -> Result<TradingConfig, SurfacedError> {
        let sent = self.config.get_config().await;
        if let Err(warnings) = sent.validate() {
            for w in &warnings {
                warn!("Saving config with questionable value: {}", w);
            }
        }

        let echoed = surface(self.api.save_config(&sent).await).map_err(|e| {
            warn!("Config save failed: {}", e);
            e
        })?;
        let saved = sent.merged_onto(&echoed);
        self.config.mark_saved(saved.clone()).await;
        Ok(saved)
    }
}

impl Drop for DashboardSync {
    fn drop(&mut self) {
        self.deactivate();
    }
}

fn fetch_surfaced<T>(
    resource: &str,
    result: Result<T, crate::gateway::GatewayError>,
) -> Result<T, SurfacedError> {
    if let Err(e) = &result {
        warn!("[{}] poll failed: {}", resource, e);
    }
    surface(result)
}

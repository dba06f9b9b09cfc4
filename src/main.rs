mod config;
mod engine;
mod gateway;
mod metrics;
mod poller;
mod resilience;
mod types;
mod web;

#[cfg(test)]
mod test_utils;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::{ConfigField, ConfigManager, Settings};
use engine::DashboardSync;
use gateway::{BotApi, HttpGateway};
use metrics::RiskIndicators;
use types::ConnectionStatus;
use web::{start_dashboard_server, AppState, ViewEvent, ViewState};

#[derive(Parser)]
#[command(name = "bot-dashboard")]
#[command(version = "0.1.0")]
#[command(about = "Monitor and control an externally running trading bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file path
    #[arg(short, long, default_value = "dashboard.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the bot continuously and log every view change
    Watch {
        /// Also serve the local web view
        #[arg(long)]
        serve: bool,

        /// Local web port (default: from settings)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Show bot status
    Status,
    /// Show balance and risk indicators
    Balance,
    /// List open positions
    Positions,
    /// Show recent bot log lines
    Logs,
    /// Start the bot
    Start,
    /// Stop the bot
    Stop,
    /// Close an open position
    Close {
        /// Position symbol, e.g. BTCUSDT
        symbol: String,
    },
    /// Check backend and exchange connectivity
    TestConnection,
    /// Show or edit the bot's trading config
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
    /// Print the effective dashboard settings
    Settings,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show the config merged with defaults
    Show,
    /// Set fields and save, e.g. `config set leverage 10 limit 50`
    Set {
        #[arg(num_args = 2.., required = true, value_names = ["FIELD", "VALUE"])]
        pairs: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json)?;

    let settings = Settings::load(&cli.config)?;
    info!("Bot dashboard v0.1.0, backend {}", settings.backend.base_url);

    match cli.command {
        Commands::Watch { serve, port } => {
            run_watch(&settings, serve, port).await?;
        }
        Commands::Status => show_status(&settings).await?,
        Commands::Balance => show_balance(&settings).await?,
        Commands::Positions => show_positions(&settings).await?,
        Commands::Logs => show_logs(&settings).await?,
        Commands::Start => {
            let ack = build_sync(&settings)?.start_bot().await?;
            println!("Bot start: {}", ack);
        }
        Commands::Stop => {
            let ack = build_sync(&settings)?.stop_bot().await?;
            println!("Bot stop: {}", ack);
        }
        Commands::Close { symbol } => {
            let ack = build_sync(&settings)?.close_position(&symbol).await?;
            println!("Close {}: {}", symbol, ack);
        }
        Commands::TestConnection => run_test_connection(&settings).await?,
        Commands::Config { action } => match action {
            ConfigCommand::Show => show_config(&settings).await?,
            ConfigCommand::Set { pairs } => set_config(&settings, &pairs).await?,
        },
        Commands::Settings => {
            print!("{}", settings.to_toml()?);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow!("failed to initialise logging: {}", e))
}

fn build_sync(settings: &Settings) -> Result<DashboardSync> {
    let gateway = HttpGateway::new(&settings.backend)?;
    let api = BotApi::new(Arc::new(gateway));
    Ok(DashboardSync::new(
        api,
        ViewState::new(),
        ConfigManager::default(),
        settings.polling.clone(),
    ))
}

async fn run_watch(settings: &Settings, serve: bool, port: Option<u16>) -> Result<()> {
    let mut sync = build_sync(settings)?;
    let view = sync.view().clone();

    sync.load_config().await;

    if serve {
        let state = AppState {
            view: view.clone(),
            config: sync.config().clone(),
        };
        let port = port.unwrap_or(settings.server.port);
        tokio::spawn(async move {
            if let Err(e) = start_dashboard_server(state, port).await {
                error!("Dashboard server error: {}", e);
            }
        });
    }

    let mut rx = view.subscribe();
    sync.activate();
    info!("Watching bot at {} (Ctrl+C to stop)", settings.backend.base_url);

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(n)) => warn!("Skipped {} view events", n),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    sync.deactivate();
    Ok(())
}

fn log_event(event: &ViewEvent) {
    match event {
        ViewEvent::StatusUpdate { status, error } => match (status, error) {
            (_, Some(e)) => warn!("Status: {}", e),
            (Some(status), None) => info!("Status: {}", status),
            (None, None) => {}
        },
        ViewEvent::BalanceUpdate {
            balance,
            degraded,
            risk,
        } => {
            let tag = if *degraded { " [simulated]" } else { "" };
            info!(
                "Balance{}: {:.2} {} (available {:.2}, used {:.2}, utilization {:.1}% {:?}, margin {})",
                tag,
                balance.total_balance,
                balance.currency,
                balance.available_balance,
                balance.used_balance,
                risk.utilization_percent,
                risk.utilization_band,
                risk.margin_status.label(),
            );
        }
        ViewEvent::PositionsUpdate { positions, error } => match (positions, error) {
            (_, Some(e)) => warn!("Positions: {}", e),
            (Some(positions), None) => info!("Positions: {} open", positions.len()),
            (None, None) => {}
        },
        ViewEvent::LogsUpdate { lines, degraded } => {
            if *degraded {
                warn!("Logs unavailable");
            } else {
                info!("Logs: {} lines", lines);
            }
        }
        ViewEvent::HealthUpdate { alive, last_ping } => {
            if *alive {
                info!("Keep-alive ok at {:?}", last_ping);
            } else {
                warn!("Keep-alive failed, last good ping {:?}", last_ping);
            }
        }
    }
}

async fn show_status(settings: &Settings) -> Result<()> {
    let sync = build_sync(settings)?;
    sync.refresh_status().await;

    let slot = sync.view().snapshot().await.status;
    if let Some(e) = slot.error {
        return Err(anyhow!(e));
    }
    let status = slot.value.unwrap_or_default();
    println!("State:      {}", status.state_label());
    println!("Mode:       {}", status.mode_label());
    println!("Uptime:     {}", status.uptime_display());
    if let Some(started) = status.start_time {
        println!("Started:    {}", started.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("Positions:  {}", status.positions_count);
    Ok(())
}

async fn show_balance(settings: &Settings) -> Result<()> {
    let sync = build_sync(settings)?;
    sync.refresh_balance().await;

    let slot = sync.view().snapshot().await.balance;
    let Some(balance) = slot.value else {
        return Err(anyhow!("no balance available"));
    };
    let risk = RiskIndicators::from_balance(&balance);

    if slot.degraded {
        println!("(simulated: backend unavailable)");
    }
    println!("Total:          {:.2} {}", balance.total_balance, balance.currency);
    println!("Available:      {:.2}", balance.available_balance);
    println!("Used:           {:.2}", balance.used_balance);
    println!(
        "Unrealized PnL: {:+.2} ({})",
        balance.unrealized_pnl,
        if balance.pnl_is_positive() { "profit" } else { "loss" }
    );
    println!("Wallet:         {:.2}", balance.total_wallet_balance);
    println!("Free margin:    {:.1}%", risk.free_margin_percent);
    println!(
        "Utilization:    {:.1}% ({:?})",
        risk.utilization_percent, risk.utilization_band
    );
    match balance.margin_ratio {
        Some(ratio) => println!("Margin ratio:   {:.2}% ({})", ratio, risk.margin_status.label()),
        None => println!("Margin ratio:   n/a ({})", risk.margin_status.label()),
    }
    println!("Health:         {}", if risk.healthy { "Healthy" } else { "Watch" });
    Ok(())
}

async fn show_positions(settings: &Settings) -> Result<()> {
    let sync = build_sync(settings)?;
    sync.refresh_positions().await;

    let slot = sync.view().snapshot().await.positions;
    if let Some(e) = slot.error {
        return Err(anyhow!(e));
    }
    let positions = slot.value.unwrap_or_default();
    if positions.is_empty() {
        println!("No open positions");
        return Ok(());
    }

    println!(
        "{:<12} {:<6} {:>12} {:>12} {:>12} {:>10} {:>8}    {}",
        "SYMBOL", "SIDE", "SIZE", "ENTRY", "CURRENT", "PNL", "PNL%", "STATUS"
    );
    for p in positions {
        let trend = if p.is_profitable() { "up" } else { "dn" };
        println!(
            "{:<12} {:<6} {:>12.4} {:>12.4} {:>12.4} {:>+10.2} {:>+7.2}% {}  {}",
            p.symbol,
            p.side,
            p.size,
            p.entry_price,
            p.current_price,
            p.pnl,
            p.pnl_percent,
            trend,
            p.status
        );
    }
    Ok(())
}

async fn show_logs(settings: &Settings) -> Result<()> {
    let sync = build_sync(settings)?;
    sync.refresh_logs().await;

    let slot = sync.view().snapshot().await.logs;
    if slot.degraded {
        warn!("Logs unavailable from bot");
    }
    for line in slot.value.unwrap_or_default() {
        println!("[{:?}] {}", line.level(), line.as_str());
    }
    Ok(())
}

async fn run_test_connection(settings: &Settings) -> Result<()> {
    let sync = build_sync(settings)?;
    let report = sync.test_connection().await;

    match report.status {
        ConnectionStatus::Success => println!("Connection OK"),
        ConnectionStatus::Error => println!("Connection failed"),
    }
    if let Some(message) = &report.message {
        println!("{}", message);
    }
    if let Some(balance) = &report.balance {
        println!("Balance: {:.2} {}", balance.total_balance, balance.currency);
    }
    Ok(())
}

async fn show_config(settings: &Settings) -> Result<()> {
    let sync = build_sync(settings)?;
    let resolved = sync.load_config().await;
    if resolved.degraded {
        println!("(defaults: backend unavailable)");
    }
    println!("{}", serde_json::to_string_pretty(&resolved.value)?);
    Ok(())
}

async fn set_config(settings: &Settings, pairs: &[String]) -> Result<()> {
    if pairs.len() % 2 != 0 {
        return Err(anyhow!("expected FIELD VALUE pairs"));
    }

    let sync = build_sync(settings)?;
    sync.load_config().await;

    for pair in pairs.chunks(2) {
        let field: ConfigField = pair[0].parse()?;
        if let Some(problem) = sync.edit_config(field, &pair[1]).await {
            println!("warning: {}", problem);
        }
    }

    let saved = sync.save_config().await?;
    println!("Saved:");
    println!("{}", serde_json::to_string_pretty(&saved)?);
    Ok(())
}

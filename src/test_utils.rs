//! Shared fixtures for unit tests.
use axum::Router;
use serde_json::{json, Value};

use crate::types::{BalanceSnapshot, Position, PositionSide};

/// Serves `app` on an ephemeral localhost port and returns its base URL.
pub async fn spawn_backend(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test backend");
    });
    format!("http://{}", addr)
}

pub fn live_balance() -> BalanceSnapshot {
    BalanceSnapshot {
        total_balance: 2000.0,
        available_balance: 1500.0,
        used_balance: 500.0,
        unrealized_pnl: -3.0,
        total_wallet_balance: 1997.0,
        currency: "USDT".to_string(),
        margin_ratio: Some(12.5),
    }
}

pub fn position(symbol: &str) -> Position {
    Position {
        symbol: symbol.to_string(),
        side: PositionSide::Long,
        size: 0.5,
        entry_price: 100.0,
        current_price: 101.0,
        pnl: 0.5,
        pnl_percent: 1.0,
        status: "OPEN".to_string(),
        leverage: None,
        margin: None,
    }
}

pub fn positions_json(symbols: &[&str]) -> Value {
    let list: Vec<Position> = symbols.iter().map(|s| position(s)).collect();
    json!({ "positions": list })
}

pub fn status_json(running: bool) -> Value {
    json!({
        "running": running,
        "start_time": null,
        "uptime": if running { Some("0h 5m") } else { None },
        "positions_count": 1,
        "test_mode": true
    })
}

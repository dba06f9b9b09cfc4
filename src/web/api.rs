use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info};

use super::AppState;

// === View Endpoints ===

pub async fn get_view(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.view.snapshot().await)
}

pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    let copy = state.config.working_copy().await;
    Json(json!({ "config": copy.value, "degraded": copy.degraded }))
}

pub async fn download_logs(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.view.log_text().await;
    let disposition = format!(
        "attachment; filename=\"bot_logs_{}.txt\"",
        Utc::now().format("%Y-%m-%d")
    );

    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
}

// === WebSocket Handler ===

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut view_rx = state.view.subscribe();
    let mut config_rx = state.config.subscribe();

    info!("WebSocket client connected");

    let initial = json!({
        "type": "initial",
        "view": state.view.snapshot().await,
        "config": state.config.get_config().await,
    });
    if let Ok(json_str) = serde_json::to_string(&initial) {
        let _ = sender.send(Message::Text(json_str)).await;
    }

    let send_task = tokio::spawn(async move {
        loop {
            let json = tokio::select! {
                event = view_rx.recv() => match event {
                    Ok(event) => serde_json::to_string(&event),
                    Err(RecvError::Lagged(n)) => {
                        debug!("WebSocket client lagged by {} view events", n);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                change = config_rx.recv() => match change {
                    Ok(change) => serde_json::to_string(&json!({
                        "type": "ConfigChange",
                        "change": change,
                    })),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
            };

            if let Ok(json) = json {
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Ping(_)) => {
                debug!("Received ping");
            }
            Ok(Message::Close(_)) => {
                info!("WebSocket client disconnected");
                break;
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
}

// === Health Check ===

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
    })
}

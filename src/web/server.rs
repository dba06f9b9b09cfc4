use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use super::{api, AppState};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(api::health_check))
        .route("/api/view", get(api::get_view))
        .route("/api/config", get(api::get_config))
        .route("/api/logs/download", get(api::download_logs))
        // WebSocket
        .route("/ws", get(api::websocket_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_dashboard_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Dashboard server starting on http://localhost:{}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

//! Pushgate server binary.
//!
//! Loads configuration from the environment, wires the hub and the
//! token verifier into the upgrade endpoint, and serves until killed.

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use pushgate::adapters::websocket::{websocket_router, WebSocketState};
use pushgate::adapters::{Hub, JwtTokenVerifier};
use pushgate::config::AppConfig;
use pushgate::ports::TokenVerifier;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("fatal: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config);

    let hub = Hub::new();
    let verifier: Arc<dyn TokenVerifier> = Arc::new(JwtTokenVerifier::new(&config.auth));
    let ws_state = WebSocketState::new(hub, verifier, config.websocket.clone());

    let app = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", websocket_router())
        .with_state(ws_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = ?config.server.environment, "pushgate listening");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins = config.server.cors_origins_list();
    if origins.is_empty() {
        return CorsLayer::new().allow_origin(Any);
    }

    let parsed: Vec<axum::http::HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new().allow_origin(AllowOrigin::list(parsed))
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level));

    if config.is_production() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

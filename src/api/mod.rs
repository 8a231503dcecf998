//! HTTP API module - REST endpoints and WebSocket

mod games;
mod websocket;

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::registry::GameRegistry;
pub use websocket::{ConnectionManager, GameSession, ServerMessage};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<GameRegistry>,
    pub connections: Arc<ConnectionManager>,
}

/// Build the API router
///
/// Spawns the notice forwarder that fans registry events out to connected
/// WebSocket clients.
pub fn router(registry: Arc<GameRegistry>) -> Router {
    let connections = Arc::new(ConnectionManager::new());

    tokio::spawn(websocket::forward_notices(
        registry.subscribe(),
        Arc::clone(&connections),
    ));

    let state = AppState {
        registry,
        connections,
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .route("/games/{game_id}/ws", get(websocket::ws_handler))
        .merge(games::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: "arenad",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        games: state.registry.game_count().await,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    games: usize,
}

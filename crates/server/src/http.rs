//! Control-plane HTTP router: health, Prometheus scrape, and the two
//! carrier-specific WebSocket upgrade routes.

use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::ws::{browser_ws_handler, telephony_ws_handler};

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    agents_loaded: usize,
}

async fn health_check(axum::extract::State(state): axum::extract::State<AppState>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        agents_loaded: state.agents.len(),
    })
}

async fn readiness_check() -> StatusCode {
    StatusCode::OK
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .route("/ws/telephony/:agent_id", get(telephony_ws_handler))
        .route("/ws/browser/:agent_id", get(browser_ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

//! Health check endpoints

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;

/// Health status response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    /// Usernames with failed or in-flight logins being tracked
    pub tracked_logins: usize,
}

/// Reports 503 when the catalog database does not answer
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    metrics::counter!("catalog_health_checks_total").increment(1);

    let (status, code, database) = match state.db.ping().await {
        Ok(()) => ("healthy", StatusCode::OK, "ok"),
        Err(e) => {
            warn!("Health check database ping failed: {}", e);
            ("degraded", StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            database,
            tracked_logins: state.auth.tracker().len(),
        }),
    )
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
}

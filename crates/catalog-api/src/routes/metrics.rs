//! Prometheus scrape endpoint

use axum::{
    Router,
    extract::State,
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    routing::get,
};
use catalog_auth::LoginAttemptTracker;
use std::sync::Arc;

use crate::state::MetricsHandle;

pub const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4";

#[derive(Clone)]
struct ScrapeState {
    handle: Arc<MetricsHandle>,
    tracker: Arc<LoginAttemptTracker>,
}

/// Mount `/metrics`; gauges derived from the login tracker are refreshed
/// on every scrape
pub fn routes(handle: Arc<MetricsHandle>, tracker: Arc<LoginAttemptTracker>) -> Router {
    Router::new()
        .route("/metrics", get(scrape))
        .with_state(ScrapeState { handle, tracker })
}

async fn scrape(State(state): State<ScrapeState>) -> impl IntoResponse {
    metrics::gauge!("catalog_tracked_logins").set(state.tracker.len() as f64);
    ([(CONTENT_TYPE, PROMETHEUS_TEXT)], state.handle.render())
}

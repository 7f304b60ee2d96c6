//! API routes

mod audit;
mod auth;
mod health;
pub mod metrics;
mod products;
pub mod types;
mod users;

use axum::{Router, middleware};
use std::sync::Arc;
use tower::ServiceBuilder;

use crate::pipeline::{
    anonymous_stage, authorization_stage, credential_stage, finalize_problem, identity_scope,
};
use crate::state::{AppState, MetricsHandle};

/// Routes that sit behind the authentication pipeline
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(auth::routes())
        .merge(products::routes())
        .merge(audit::routes())
        .merge(users::routes())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(identity_scope))
                .layer(middleware::from_fn(anonymous_stage))
                .layer(middleware::from_fn_with_state(state.clone(), credential_stage))
                .layer(middleware::from_fn_with_state(state, authorization_stage)),
        )
}

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let tracker = state.auth.tracker().clone();
    let mut router = Router::new()
        // Health check
        .merge(health::routes())
        // Catalog API
        .merge(protected_routes(state.clone()))
        .layer(middleware::from_fn_with_state(state.clone(), finalize_problem))
        .with_state(state);

    // Add metrics endpoint if handle is provided
    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle, tracker));
    }

    router
}

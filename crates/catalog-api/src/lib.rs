//! Catalog REST API
//!
//! This crate provides the Axum-based HTTP API for the catalog service:
//! the authentication pipeline, problem-detail errors and the product,
//! audit and user routes that sit behind it.

pub mod error;
pub mod pipeline;
pub mod routes;
pub mod state;

pub use error::{ApiError, Problem};
pub use pipeline::{Decision, RoutePolicy};
pub use routes::create_router;
pub use state::{AppState, DEFAULT_REALM, MetricsHandle};

//! Application state

use catalog_auth::AuthService;
use catalog_db::Database;
use std::sync::Arc;

use crate::pipeline::RoutePolicy;

/// Prometheus handle rendered by the `/metrics` route
pub type MetricsHandle = metrics_exporter_prometheus::PrometheusHandle;

/// Default realm advertised in `WWW-Authenticate` challenges
pub const DEFAULT_REALM: &str = "Catalog";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth: AuthService,
    pub policy: Arc<RoutePolicy>,
    pub realm: Arc<str>,
}

impl AppState {
    pub fn new(db: Database, auth: AuthService, policy: RoutePolicy, realm: &str) -> Self {
        Self {
            db,
            auth,
            policy: Arc::new(policy),
            realm: Arc::from(realm),
        }
    }
}

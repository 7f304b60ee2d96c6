//! Self-service identity routes

use axum::{Json, Router, extract::State, routing::{get, post}};

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{LogoutResponse, MeResponse};

/// GET /api/v1/auth/me
async fn me(State(state): State<AppState>) -> Result<Json<MeResponse>, ApiError> {
    let user = state.auth.current_user()?;

    Ok(Json(MeResponse {
        is_admin: user.role.is_admin(),
        role: user.role.as_str().to_string(),
        username: user.username,
    }))
}

/// POST /api/v1/auth/logout
async fn logout(State(state): State<AppState>) -> Json<LogoutResponse> {
    state.auth.logout();

    Json(LogoutResponse {
        message: "Logged out".to_string(),
        username: state.auth.current_username(),
    })
}

/// Create auth routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/me", get(me))
        .route("/api/v1/auth/logout", post(logout))
}

//! User provisioning routes

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use catalog_db::UserRole;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{CreateUserRequest, UserResponse};

// ==================== Input Validation ====================

/// Maximum allowed username length
const MAX_USERNAME_LENGTH: usize = 64;
/// Maximum allowed password length
const MAX_PASSWORD_LENGTH: usize = 256;

/// Validate username format and length
fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() {
        return Err(ApiError::BadRequest("Username cannot be empty".to_string()));
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Username exceeds maximum length of {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    // Only allow alphanumeric characters, underscores, and hyphens
    if !username.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(ApiError::BadRequest(
            "Username can only contain alphanumeric characters, underscores, and hyphens".to_string(),
        ));
    }
    Ok(())
}

// ==================== User Routes ====================

/// GET /api/v1/users (Admin only)
async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.db.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// POST /api/v1/users (Admin only)
async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    validate_username(&request.username)?;
    if request.password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password exceeds maximum length of {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }

    let role = UserRole::from_str(&request.role)
        .map_err(|_| ApiError::BadRequest(format!("Invalid role: {}", request.role)))?;

    debug!("Creating user: {}", request.username);

    let user = state
        .auth
        .register(&request.username, &request.password, role)
        .await?;

    info!(
        "{} created user {} ({})",
        state.auth.current_username(),
        user.username,
        user.role
    );

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Create user routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/v1/users", get(list_users).post(create_user))
}

//! Audit log routes

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use catalog_db::AuditLogQuery;

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{AuditLogListQuery, AuditLogListResponse, AuditLogResponse, clamp_page};

/// GET /api/v1/audit (Admin only)
async fn list_audit_logs(
    State(state): State<AppState>,
    Query(params): Query<AuditLogListQuery>,
) -> Result<Json<AuditLogListResponse>, ApiError> {
    let (offset, limit) = clamp_page(params.offset, params.limit);

    let (logs, total) = state
        .db
        .list_audit_logs(AuditLogQuery {
            username: params.username.filter(|s| !s.is_empty()),
            action: params.action.filter(|s| !s.is_empty()),
            offset,
            limit,
        })
        .await?;

    Ok(Json(AuditLogListResponse {
        logs: logs.into_iter().map(AuditLogResponse::from).collect(),
        total,
        offset,
        limit,
    }))
}

/// Create audit routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/v1/audit", get(list_audit_logs))
}

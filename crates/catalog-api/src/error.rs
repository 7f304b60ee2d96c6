//! API error types
//!
//! Every error leaves the service as an RFC 9457 problem document.

use axum::http::header::{CONTENT_TYPE, WWW_AUTHENTICATE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use catalog_auth::{AuthError, PasswordError};
use catalog_db::DbError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::state::DEFAULT_REALM;

pub const PROBLEM_JSON: &str = "application/problem+json";

/// RFC 9457 problem details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl Problem {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            problem_type: "about:blank".to_string(),
            title: status.canonical_reason().unwrap_or("Error").to_string(),
            status: status.as_u16(),
            detail: detail.into(),
            instance: None,
        }
    }

    /// Render as a response, keeping a copy in the extensions so outer
    /// layers can fill in `instance`
    pub fn into_response_with_status(self, status: StatusCode) -> Response {
        let mut response = (status, Json(self.clone())).into_response();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON));
        response.extensions_mut().insert(self);
        response
    }
}

/// `WWW-Authenticate` value for the Basic scheme
pub fn basic_challenge(realm: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm.replace('"', "")))
        .unwrap_or_else(|_| HeaderValue::from_static("Basic realm=\"Catalog\""))
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

const INTERNAL_DETAIL: &str = "An internal error occurred";

fn database_status(e: &DbError) -> (StatusCode, String) {
    match e {
        DbError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        DbError::Duplicate(msg) => (StatusCode::CONFLICT, msg.clone()),
        DbError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        _ => {
            error!("Database error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_DETAIL.to_string())
        }
    }
}

impl ApiError {
    /// Status code and client-facing detail
    pub fn status_and_detail(&self) -> (StatusCode, String) {
        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_DETAIL.to_string())
            }
            ApiError::Auth(e) => match e {
                AuthError::AccessDenied => (StatusCode::FORBIDDEN, e.to_string()),
                AuthError::Password(PasswordError::Policy(violation)) => {
                    (StatusCode::BAD_REQUEST, violation.to_string())
                }
                AuthError::InvalidRole(_) | AuthError::InvalidUsername(_) => {
                    (StatusCode::BAD_REQUEST, e.to_string())
                }
                AuthError::Store(db) => database_status(db),
                AuthError::ContextUnbound | AuthError::Password(PasswordError::Hashing(_)) => {
                    error!("Authentication fault: {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_DETAIL.to_string())
                }
            },
            ApiError::Database(e) => database_status(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();
        let mut response = Problem::new(status, detail).into_response_with_status(status);

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, basic_challenge(DEFAULT_REALM));
        }
        response
    }
}

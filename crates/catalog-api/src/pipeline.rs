//! Request authentication pipeline
//!
//! Protected routes run through these stages in order:
//!
//! 0. [`identity_scope`] opens a task-local identity slot for the request
//! 1. [`anonymous_stage`] binds the anonymous identity
//! 2. [`credential_stage`] authenticates HTTP Basic credentials
//! 3. [`authorization_stage`] applies the [`RoutePolicy`] and runs the handler
//!
//! [`finalize_problem`] sits outside all of them and stamps problem
//! responses with the request path and the configured realm.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{
        HeaderValue, Method, StatusCode,
        header::{AUTHORIZATION, CONTENT_LENGTH, WWW_AUTHENTICATE},
    },
    middleware::Next,
    response::Response,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use catalog_auth::IdentityContext;
use catalog_db::{User, UserRole};
use tracing::{debug, warn};

use crate::error::{ApiError, Problem, basic_challenge};
use crate::state::AppState;

pub const MSG_MISSING_HEADER: &str = "Missing or invalid Authorization header";
pub const MSG_BAD_CREDENTIAL_FORMAT: &str = "Invalid credential format";
pub const MSG_AUTHENTICATION_REQUIRED: &str = "Authentication required";
pub const MSG_ADMIN_REQUIRED: &str = "Administrator role required";

/// Path prefix of the self-service endpoints every signed-in user may call
pub const SELF_SERVICE_PREFIX: &str = "/api/v1/auth";

/// Default read-only browse prefixes
pub const DEFAULT_BROWSE_PREFIXES: &[&str] = &["/api/v1/products"];

// ==================== Route Policy ====================

/// Outcome of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Unauthenticated,
    Forbidden,
}

/// Maps a request to the role it requires
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    browse_prefixes: Vec<String>,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BROWSE_PREFIXES.iter().map(|p| p.to_string()))
    }
}

fn under_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

impl RoutePolicy {
    pub fn new(browse_prefixes: impl IntoIterator<Item = String>) -> Self {
        Self {
            browse_prefixes: browse_prefixes
                .into_iter()
                .filter(|p| !p.trim_end_matches('/').is_empty())
                .collect(),
        }
    }

    /// Decide whether `role` may perform `method` on `path`
    ///
    /// Anonymous callers are never allowed. Signed-in users may browse the
    /// catalog read-only and use the self-service endpoints; everything
    /// else needs the admin role.
    pub fn decide(&self, method: &Method, path: &str, role: UserRole) -> Decision {
        match role {
            UserRole::Anonymous => Decision::Unauthenticated,
            UserRole::Admin => Decision::Allow,
            UserRole::User => {
                let read_only = method == Method::GET || method == Method::HEAD;
                let browsing = read_only
                    && self
                        .browse_prefixes
                        .iter()
                        .any(|prefix| under_prefix(path, prefix));

                if browsing || under_prefix(path, SELF_SERVICE_PREFIX) {
                    Decision::Allow
                } else {
                    Decision::Forbidden
                }
            }
        }
    }
}

// ==================== Credential Parsing ====================

/// Parse an `Authorization: Basic ...` header into username and password
pub fn parse_basic_credentials(header: Option<&HeaderValue>) -> Result<(String, String), ApiError> {
    let missing = || ApiError::Unauthorized(MSG_MISSING_HEADER.to_string());
    let malformed = || ApiError::Unauthorized(MSG_BAD_CREDENTIAL_FORMAT.to_string());

    let value = header.and_then(|h| h.to_str().ok()).ok_or_else(missing)?;
    let (scheme, encoded) = value.trim().split_once(' ').ok_or_else(missing)?;
    if !scheme.eq_ignore_ascii_case("Basic") {
        return Err(missing());
    }

    let decoded = STANDARD.decode(encoded.trim()).map_err(|_| malformed())?;
    let decoded = String::from_utf8(decoded).map_err(|_| malformed())?;
    let (username, password) = decoded.split_once(':').ok_or_else(malformed)?;

    Ok((username.to_string(), password.to_string()))
}

// ==================== Stages ====================

/// Outermost layer: fill in `instance` and the configured realm on problems
pub async fn finalize_problem(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;

    let Some(mut problem) = response.extensions_mut().remove::<Problem>() else {
        return response;
    };

    if response.status() == StatusCode::UNAUTHORIZED {
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, basic_challenge(&state.realm));
    }

    problem.instance = Some(path);
    match serde_json::to_vec(&problem) {
        Ok(body) => {
            let (mut parts, _) = response.into_parts();
            parts.headers.remove(CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(body))
        }
        Err(e) => {
            warn!("Failed to render problem document: {}", e);
            response
        }
    }
}

/// Stage 0: run the rest of the request inside a fresh identity scope
pub async fn identity_scope(request: Request, next: Next) -> Response {
    IdentityContext::scope(next.run(request)).await
}

/// Stage 1: bind the anonymous identity when nothing is bound yet
pub async fn anonymous_stage(request: Request, next: Next) -> Result<Response, ApiError> {
    if IdentityContext::get().is_none() {
        IdentityContext::set(User::anonymous())?;
    }
    Ok(next.run(request).await)
}

/// Stage 2: authenticate Basic credentials
pub async fn credential_stage(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (username, password) = parse_basic_credentials(request.headers().get(AUTHORIZATION))?;

    let result = state.auth.login(&username, &password).await?;
    if !result.success {
        debug!("Rejected credentials for {}: {}", username, result.message);
        return Err(ApiError::Unauthorized(result.message));
    }

    Ok(next.run(request).await)
}

/// Stage 3: enforce the route policy, run the handler, then unbind
pub async fn authorization_stage(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = IdentityContext::get_or_fail()?;
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match state.policy.decide(&method, &path, user.role) {
        Decision::Allow => {
            let response = next.run(request).await;
            IdentityContext::clear();
            Ok(response)
        }
        Decision::Unauthenticated => {
            Err(ApiError::Unauthorized(MSG_AUTHENTICATION_REQUIRED.to_string()))
        }
        Decision::Forbidden => {
            state.auth.record_denial(&format!("{} {}", method, path));
            Err(ApiError::Forbidden(MSG_ADMIN_REQUIRED.to_string()))
        }
    }
}

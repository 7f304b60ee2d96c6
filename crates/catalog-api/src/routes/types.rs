//! Request/Response DTOs

use catalog_db::{AuditLog, Product, User, utils::format_price};
use serde::{Deserialize, Serialize};

/// Largest page any list endpoint returns
pub const MAX_PAGE_SIZE: i64 = 100;

fn default_offset() -> i64 {
    0
}

fn default_limit() -> i64 {
    50
}

/// Clamp client-supplied pagination into a sane window
pub fn clamp_page(offset: i64, limit: i64) -> (i64, i64) {
    (offset.max(0), limit.clamp(1, MAX_PAGE_SIZE))
}

// ==================== Auth Types ====================

/// Current identity
#[derive(Serialize, Deserialize)]
pub struct MeResponse {
    pub username: String,
    pub role: String,
    pub is_admin: bool,
}

/// Logout acknowledgement
#[derive(Serialize, Deserialize)]
pub struct LogoutResponse {
    pub message: String,
    pub username: String,
}

// ==================== User Types ====================

/// Create user request
#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: String,
}

/// User response (without password)
#[derive(Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            role: u.role.as_str().to_string(),
            created_at: u.created_at.to_rfc3339(),
            updated_at: u.updated_at.to_rfc3339(),
        }
    }
}

// ==================== Product Types ====================

/// Product listing query parameters
#[derive(Deserialize, Default)]
pub struct ProductListQuery {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    /// Lower price bound in major units, e.g. `19.99`
    #[serde(default)]
    pub min_price: Option<f64>,
    /// Upper price bound in major units
    #[serde(default)]
    pub max_price: Option<f64>,
    #[serde(default = "default_offset")]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// Create product request
#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    pub brand: String,
    pub price_cents: i64,
}

/// Update product request
#[derive(Deserialize, Default)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub price_cents: Option<i64>,
}

/// Product response
#[derive(Serialize, Deserialize)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub brand: String,
    pub price: String,
    pub price_cents: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            category: p.category,
            brand: p.brand,
            price: format_price(p.price_cents),
            price_cents: p.price_cents,
            created_at: p.created_at.to_rfc3339(),
            updated_at: p.updated_at.to_rfc3339(),
        }
    }
}

/// Paginated products response
#[derive(Serialize, Deserialize)]
pub struct ProductListResponse {
    pub products: Vec<ProductResponse>,
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
}

// ==================== Audit Types ====================

/// Audit log query parameters
#[derive(Deserialize, Default)]
pub struct AuditLogListQuery {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default = "default_offset")]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// Audit log entry response
#[derive(Serialize, Deserialize)]
pub struct AuditLogResponse {
    pub id: i64,
    pub timestamp: String,
    pub username: String,
    pub action: String,
    pub details: Option<String>,
}

impl From<AuditLog> for AuditLogResponse {
    fn from(log: AuditLog) -> Self {
        Self {
            id: log.id,
            timestamp: log.timestamp.to_rfc3339(),
            username: log.username,
            action: log.action,
            details: log.details,
        }
    }
}

/// Paginated audit log response
#[derive(Serialize, Deserialize)]
pub struct AuditLogListResponse {
    pub logs: Vec<AuditLogResponse>,
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
}

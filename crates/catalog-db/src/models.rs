//! Database models

use crate::utils::parse_datetime_or_now;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Username carried by the anonymous identity
pub const ANONYMOUS_USERNAME: &str = "anonymous";

/// Error type for parsing models from strings
#[derive(Debug, Clone)]
pub enum ParseError {
    InvalidUserRole(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidUserRole(s) => write!(f, "Invalid user role: {}", s),
        }
    }
}

impl std::error::Error for ParseError {}

/// User role
///
/// `Anonymous` only ever appears on the in-memory anonymous identity; it is
/// never written to the `users` table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Anonymous,
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Anonymous => "anonymous",
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, UserRole::Anonymous)
    }
}

impl FromStr for UserRole {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anonymous" => Ok(UserRole::Anonymous),
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            _ => Err(ParseError::InvalidUserRole(s.to_string())),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User model
///
/// Two users are the same identity when their usernames match; the other
/// fields do not take part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The identity bound to a request before any credentials are checked
    pub fn anonymous() -> Self {
        let epoch = DateTime::<Utc>::default();
        Self {
            id: 0,
            username: ANONYMOUS_USERNAME.to_string(),
            password_hash: String::new(),
            role: UserRole::Anonymous,
            created_at: epoch,
            updated_at: epoch,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.role == UserRole::Anonymous
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.username.hash(state);
    }
}

/// New user (for insertion)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: UserRole,
}

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub username: String,
    pub action: String,
    pub details: Option<String>,
}

/// New audit log entry (for insertion)
#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub username: String,
    pub action: String,
    pub details: Option<String>,
}

/// Catalog product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub brand: String,
    /// Price in minor currency units
    pub price_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New product (for insertion)
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub brand: String,
    pub price_cents: i64,
}

/// Update product (for partial updates)
#[derive(Debug, Clone, Default)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub price_cents: Option<i64>,
}

// ==================== TryFrom Implementations ====================

impl TryFrom<&sqlx::sqlite::SqliteRow> for User {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        let role_str: String = row.try_get("role")?;
        Ok(User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            role: UserRole::from_str(&role_str).unwrap_or(UserRole::User),
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
            updated_at: parse_datetime_or_now(&row.try_get::<String, _>("updated_at")?),
        })
    }
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for AuditLog {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        Ok(AuditLog {
            id: row.try_get("id")?,
            timestamp: parse_datetime_or_now(&row.try_get::<String, _>("timestamp")?),
            username: row.try_get("username")?,
            action: row.try_get("action")?,
            details: row.try_get("details")?,
        })
    }
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for Product {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            category: row.try_get("category")?,
            brand: row.try_get("brand")?,
            price_cents: row.try_get("price_cents")?,
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
            updated_at: parse_datetime_or_now(&row.try_get::<String, _>("updated_at")?),
        })
    }
}

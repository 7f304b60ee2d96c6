//! Catalog Database Layer
//!
//! This crate provides the persistence layer for the catalog service:
//! user accounts, the audit trail and the product catalog, stored in
//! SQLite via sqlx.

pub mod error;
pub mod models;
pub mod repository;
pub mod utils;

pub use error::DbError;
pub use models::*;
pub use repository::{AuditLogQuery, Database, ProductQuery};

/// Re-export sqlx types for convenience
pub use sqlx::SqlitePool;

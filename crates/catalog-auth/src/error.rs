//! Authentication error types

use catalog_db::DbError;
use thiserror::Error;

use crate::password::PasswordError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Access denied: administrator role required")]
    AccessDenied,

    #[error("No identity context is bound to the current task")]
    ContextUnbound,

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("User store error: {0}")]
    Store(#[from] DbError),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),
}

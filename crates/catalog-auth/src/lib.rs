//! Catalog Authentication and Authorization
//!
//! This crate provides password hashing, brute-force lockout tracking,
//! request-scoped identity propagation and the login/logout/role checks
//! that the HTTP pipeline builds on.

pub mod attempts;
pub mod audit;
pub mod context;
pub mod error;
pub mod password;
pub mod service;
pub mod store;

pub use attempts::{
    AttemptReservation, Clock, LockoutPolicy, LoginAttempt, LoginAttemptTracker, ManualClock, SystemClock,
    spawn_attempt_sweeper,
};
pub use audit::{
    AuditEvent, AuditEventKind, AuditSink, DatabaseAuditSink, RecordingAuditSink,
    TracingAuditSink,
};
pub use context::IdentityContext;
pub use error::AuthError;
pub use password::{PasswordError, PasswordHasher, PasswordPolicyViolation, constant_time_eq};
pub use service::{AuthService, LoginResult};
pub use store::UserStore;

//! Audit event sinks
//!
//! Recording is fire-and-forget: a sink never blocks the caller on I/O and
//! never reports failure back to it.

use catalog_db::{Database, NewAuditLog};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Kind of security-relevant event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditEventKind {
    LoginSuccess,
    LoginFailure,
    Logout,
    AccessDenied,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::LoginSuccess => "login-success",
            AuditEventKind::LoginFailure => "login-failure",
            AuditEventKind::Logout => "logout",
            AuditEventKind::AccessDenied => "access-denied",
        }
    }
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for audit events
pub trait AuditSink: Send + Sync {
    fn record(&self, username: &str, kind: AuditEventKind, detail: &str);
}

/// Persists events to the `audit_logs` table
#[derive(Clone)]
pub struct DatabaseAuditSink {
    db: Database,
}

impl DatabaseAuditSink {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl AuditSink for DatabaseAuditSink {
    fn record(&self, username: &str, kind: AuditEventKind, detail: &str) {
        debug!(username, action = kind.as_str(), detail, "Recording audit event");

        let entry = NewAuditLog {
            username: username.to_string(),
            action: kind.as_str().to_string(),
            details: (!detail.is_empty()).then(|| detail.to_string()),
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let db = self.db.clone();
                handle.spawn(async move {
                    if let Err(e) = db.insert_audit_log(entry).await {
                        warn!("Failed to persist audit event: {}", e);
                    }
                });
            }
            Err(_) => {
                warn!(
                    "No async runtime available; dropping audit event {} for {}",
                    entry.action, entry.username
                );
            }
        }
    }
}

/// Emits events as structured log records only
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, username: &str, kind: AuditEventKind, detail: &str) {
        info!(target: "audit", username, action = kind.as_str(), detail, "Audit event");
    }
}

/// A recorded audit event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub username: String,
    pub kind: AuditEventKind,
    pub detail: String,
}

/// Keeps events in memory so callers can inspect them
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    pub fn events_of(&self, kind: AuditEventKind) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.kind == kind)
            .cloned()
            .collect()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, username: &str, kind: AuditEventKind, detail: &str) {
        self.events.lock().push(AuditEvent {
            username: username.to_string(),
            kind,
            detail: detail.to_string(),
        });
    }
}

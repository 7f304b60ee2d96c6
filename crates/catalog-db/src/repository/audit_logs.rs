//! Audit log operations

use chrono::Utc;
use sqlx::Row;

use crate::error::DbError;
use crate::models::{AuditLog, NewAuditLog};
use crate::repository::Database;

/// Query parameters for listing audit logs
#[derive(Debug, Clone, Default)]
pub struct AuditLogQuery {
    /// Filter by username
    pub username: Option<String>,
    /// Filter by action
    pub action: Option<String>,
    /// Pagination offset
    pub offset: i64,
    /// Pagination limit
    pub limit: i64,
}

impl Database {
    /// Insert a new audit log entry
    pub async fn insert_audit_log(&self, log: NewAuditLog) -> Result<AuditLog, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO audit_logs (timestamp, username, action, details)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(now.to_rfc3339())
        .bind(&log.username)
        .bind(&log.action)
        .bind(&log.details)
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = result.get("id");

        Ok(AuditLog {
            id,
            timestamp: now,
            username: log.username,
            action: log.action,
            details: log.details,
        })
    }

    /// List audit logs, newest first, with filtering and pagination
    pub async fn list_audit_logs(
        &self,
        query: AuditLogQuery,
    ) -> Result<(Vec<AuditLog>, i64), DbError> {
        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(username) = &query.username {
            conditions.push("username = ?");
            params.push(username.clone());
        }
        if let Some(action) = &query.action {
            conditions.push("action = ?");
            params.push(action.clone());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) as count FROM audit_logs {}", where_clause);
        let mut count_query = sqlx::query(&count_sql);
        for param in &params {
            count_query = count_query.bind(param);
        }
        let count_row = count_query.fetch_one(&self.pool).await?;
        let total: i64 = count_row.get("count");

        let sql = format!(
            r#"
            SELECT id, timestamp, username, action, details
            FROM audit_logs
            {}
            ORDER BY timestamp DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
            where_clause
        );

        let mut logs_query = sqlx::query(&sql);
        for param in &params {
            logs_query = logs_query.bind(param);
        }
        logs_query = logs_query.bind(query.limit).bind(query.offset);

        let rows = logs_query.fetch_all(&self.pool).await?;
        let logs: Result<Vec<AuditLog>, _> = rows
            .iter()
            .map(|row| AuditLog::try_from(row).map_err(DbError::from))
            .collect();

        Ok((logs?, total))
    }
}

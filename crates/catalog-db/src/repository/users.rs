//! User operations

use chrono::Utc;
use sqlx::Row;

use crate::error::DbError;
use crate::models::{NewUser, User, UserRole};
use crate::repository::Database;

impl Database {
    // ==================== User Operations ====================

    /// Insert a new user
    pub async fn insert_user(&self, user: NewUser) -> Result<User, DbError> {
        if user.role == UserRole::Anonymous {
            return Err(DbError::InvalidInput(
                "the anonymous role cannot be persisted".to_string(),
            ));
        }

        let existing = self.get_user_by_username(&user.username).await?;
        if existing.is_some() {
            return Err(DbError::Duplicate(format!("User '{}' already exists", user.username)));
        }

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = result.get("id");

        Ok(User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a user by username
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, username, password_hash, role, created_at, updated_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// List all users
    pub async fn list_users(&self) -> Result<Vec<User>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, username, password_hash, role, created_at, updated_at
            FROM users
            ORDER BY username
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| User::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Check if any users exist
    pub async fn has_users(&self) -> Result<bool, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, role: UserRole) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: "c2FsdA==:a2V5".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup_user() {
        let db = Database::in_memory().await.unwrap();
        assert!(!db.has_users().await.unwrap());

        let created = db.insert_user(new_user("admin", UserRole::Admin)).await.unwrap();
        assert!(created.id > 0);

        let found = db.get_user_by_username("admin").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.role, UserRole::Admin);
        assert_eq!(found.password_hash, "c2FsdA==:a2V5");
        assert!(db.has_users().await.unwrap());

        assert!(db.get_user_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let db = Database::in_memory().await.unwrap();
        db.insert_user(new_user("user", UserRole::User)).await.unwrap();

        let result = db.insert_user(new_user("user", UserRole::Admin)).await;
        assert!(matches!(result, Err(DbError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_anonymous_role_never_persisted() {
        let db = Database::in_memory().await.unwrap();
        let result = db.insert_user(new_user("ghost", UserRole::Anonymous)).await;
        assert!(result.is_err());
        assert!(!db.has_users().await.unwrap());
    }

    #[tokio::test]
    async fn test_list_users_sorted_by_name() {
        let db = Database::in_memory().await.unwrap();
        db.insert_user(new_user("bob", UserRole::User)).await.unwrap();
        db.insert_user(new_user("alice", UserRole::Admin)).await.unwrap();

        let users = db.list_users().await.unwrap();
        let names: Vec<_> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert_eq!(users[0].role, UserRole::Admin);
    }
}

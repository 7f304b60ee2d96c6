//! User persistence seam

use async_trait::async_trait;
use catalog_db::{Database, DbError, NewUser, User};

/// Lookup and persistence of user accounts
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DbError>;

    async fn save(&self, user: NewUser) -> Result<User, DbError>;
}

#[async_trait]
impl UserStore for Database {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        self.get_user_by_username(username).await
    }

    async fn save(&self, user: NewUser) -> Result<User, DbError> {
        self.insert_user(user).await
    }
}

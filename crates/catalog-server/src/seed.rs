//! Default data for a fresh database

use anyhow::{Context, Result};
use catalog_auth::AuthService;
use catalog_db::{Database, NewProduct, UserRole};
use tracing::info;

/// Accounts created on an empty user table
const DEFAULT_USERS: &[(&str, &str, UserRole)] = &[
    ("admin", "Admin123!", UserRole::Admin),
    ("user", "User123!", UserRole::User),
];

/// Sample catalog: name, category, brand, price in cents
const SAMPLE_PRODUCTS: &[(&str, &str, &str, i64)] = &[
    ("Laptop Pro 15", "Electronics", "Acme", 129_999),
    ("Wireless Mouse", "Electronics", "Acme", 2_499),
    ("Noise-Cancelling Headphones", "Electronics", "Zenith", 19_900),
    ("Ergonomic Office Chair", "Furniture", "Sitwell", 24_950),
    ("Standing Desk", "Furniture", "Sitwell", 39_900),
    ("Cotton T-Shirt", "Apparel", "Loom", 1_999),
];

/// Create the default accounts and sample products where missing
pub async fn seed_defaults(db: &Database, auth: &AuthService) -> Result<()> {
    if !db.has_users().await? {
        info!("Creating default users");
        for (username, password, role) in DEFAULT_USERS {
            auth.register(username, password, *role)
                .await
                .with_context(|| format!("Failed to create default user {}", username))?;
            info!("Default user created (username: {}, role: {})", username, role);
        }
    }

    if !db.has_products().await? {
        info!("Creating sample products");
        for (name, category, brand, price_cents) in SAMPLE_PRODUCTS {
            db.insert_product(NewProduct {
                name: name.to_string(),
                description: None,
                category: category.to_string(),
                brand: brand.to_string(),
                price_cents: *price_cents,
            })
            .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_auth::{
        IdentityContext, LoginAttemptTracker, PasswordHasher, TracingAuditSink,
    };
    use std::sync::Arc;

    fn service(db: &Database) -> AuthService {
        AuthService::new(
            Arc::new(db.clone()),
            Arc::new(TracingAuditSink),
            PasswordHasher::with_iterations(1_000),
            Arc::new(LoginAttemptTracker::default()),
        )
    }

    #[tokio::test]
    async fn test_seed_creates_defaults_once() {
        let db = Database::in_memory().await.unwrap();
        let auth = service(&db);

        seed_defaults(&db, &auth).await.unwrap();
        seed_defaults(&db, &auth).await.unwrap();

        let users = db.list_users().await.unwrap();
        assert_eq!(users.len(), 2);
        let (_, total) = db
            .list_products(catalog_db::ProductQuery {
                limit: 100,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, SAMPLE_PRODUCTS.len() as i64);

        IdentityContext::scope(async {
            assert!(auth.login("admin", "Admin123!").await.unwrap().success);
            assert!(auth.is_admin());
            assert!(auth.login("user", "User123!").await.unwrap().success);
            assert!(!auth.is_admin());
        })
        .await;
    }
}

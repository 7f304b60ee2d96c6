//! Product catalog operations

use chrono::Utc;
use sqlx::Row;

use crate::error::DbError;
use crate::models::{NewProduct, Product, UpdateProduct};
use crate::repository::Database;
use crate::utils::escape_like;

/// Query parameters for listing products
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    /// Case-insensitive substring match on the product name
    pub name: Option<String>,
    /// Exact category match
    pub category: Option<String>,
    /// Exact brand match
    pub brand: Option<String>,
    /// Inclusive lower price bound, in minor units
    pub min_price_cents: Option<i64>,
    /// Inclusive upper price bound, in minor units
    pub max_price_cents: Option<i64>,
    /// Pagination offset
    pub offset: i64,
    /// Pagination limit
    pub limit: i64,
}

enum Param {
    Text(String),
    Int(i64),
}

impl Database {
    // ==================== Product Operations ====================

    /// Insert a new product
    pub async fn insert_product(&self, product: NewProduct) -> Result<Product, DbError> {
        if product.price_cents < 0 {
            return Err(DbError::InvalidInput("price must not be negative".to_string()));
        }

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO products (name, description, category, brand, price_cents, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(&product.brand)
        .bind(product.price_cents)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = result.get("id");

        Ok(Product {
            id,
            name: product.name,
            description: product.description,
            category: product.category,
            brand: product.brand,
            price_cents: product.price_cents,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a product by ID
    pub async fn get_product(&self, id: i64) -> Result<Option<Product>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, name, description, category, brand, price_cents, created_at, updated_at
            FROM products
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| Product::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// List products with filtering and pagination
    pub async fn list_products(
        &self,
        query: ProductQuery,
    ) -> Result<(Vec<Product>, i64), DbError> {
        let mut conditions = Vec::new();
        let mut params: Vec<Param> = Vec::new();

        if let Some(name) = &query.name {
            conditions.push(r"LOWER(name) LIKE LOWER(?) ESCAPE '\'");
            params.push(Param::Text(format!("%{}%", escape_like(name))));
        }
        if let Some(category) = &query.category {
            conditions.push("category = ?");
            params.push(Param::Text(category.clone()));
        }
        if let Some(brand) = &query.brand {
            conditions.push("brand = ?");
            params.push(Param::Text(brand.clone()));
        }
        if let Some(min) = query.min_price_cents {
            conditions.push("price_cents >= ?");
            params.push(Param::Int(min));
        }
        if let Some(max) = query.max_price_cents {
            conditions.push("price_cents <= ?");
            params.push(Param::Int(max));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) as count FROM products {}", where_clause);
        let mut count_query = sqlx::query(&count_sql);
        for param in &params {
            count_query = match param {
                Param::Text(s) => count_query.bind(s),
                Param::Int(n) => count_query.bind(*n),
            };
        }
        let count_row = count_query.fetch_one(&self.pool).await?;
        let total: i64 = count_row.get("count");

        let sql = format!(
            r#"
            SELECT id, name, description, category, brand, price_cents, created_at, updated_at
            FROM products
            {}
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
            where_clause
        );

        let mut list_query = sqlx::query(&sql);
        for param in &params {
            list_query = match param {
                Param::Text(s) => list_query.bind(s),
                Param::Int(n) => list_query.bind(*n),
            };
        }
        list_query = list_query.bind(query.limit).bind(query.offset);

        let rows = list_query.fetch_all(&self.pool).await?;
        let products: Result<Vec<Product>, _> = rows
            .iter()
            .map(|row| Product::try_from(row).map_err(DbError::from))
            .collect();

        Ok((products?, total))
    }

    /// Apply a partial update; returns `None` when the product does not exist
    pub async fn update_product(
        &self,
        id: i64,
        update: UpdateProduct,
    ) -> Result<Option<Product>, DbError> {
        let Some(mut product) = self.get_product(id).await? else {
            return Ok(None);
        };

        if let Some(price) = update.price_cents {
            if price < 0 {
                return Err(DbError::InvalidInput("price must not be negative".to_string()));
            }
            product.price_cents = price;
        }
        if let Some(name) = update.name {
            product.name = name;
        }
        if let Some(description) = update.description {
            product.description = description;
        }
        if let Some(category) = update.category {
            product.category = category;
        }
        if let Some(brand) = update.brand {
            product.brand = brand;
        }
        product.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE products
            SET name = ?, description = ?, category = ?, brand = ?, price_cents = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(&product.brand)
        .bind(product.price_cents)
        .bind(product.updated_at.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(Some(product))
    }

    /// Delete a product
    pub async fn delete_product(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Check if the catalog has any products
    pub async fn has_products(&self) -> Result<bool, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM products")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, category: &str, brand: &str, price_cents: i64) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: None,
            category: category.to_string(),
            brand: brand.to_string(),
            price_cents,
        }
    }

    async fn seeded() -> Database {
        let db = Database::in_memory().await.unwrap();
        db.insert_product(product("Laptop Pro", "Electronics", "Acme", 129999))
            .await
            .unwrap();
        db.insert_product(product("Laptop Air", "Electronics", "Zenith", 99900))
            .await
            .unwrap();
        db.insert_product(product("Desk Chair", "Furniture", "Acme", 24950))
            .await
            .unwrap();
        db.insert_product(product("100%_Cotton Shirt", "Apparel", "Loom", 1999))
            .await
            .unwrap();
        db
    }

    fn page() -> ProductQuery {
        ProductQuery {
            limit: 50,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_list_products_filters() {
        let db = seeded().await;

        let (all, total) = db.list_products(page()).await.unwrap();
        assert_eq!(total, 4);
        assert_eq!(all.len(), 4);

        let (laptops, _) = db
            .list_products(ProductQuery {
                name: Some("laptop".to_string()),
                ..page()
            })
            .await
            .unwrap();
        assert_eq!(laptops.len(), 2);

        let (acme, _) = db
            .list_products(ProductQuery {
                brand: Some("Acme".to_string()),
                ..page()
            })
            .await
            .unwrap();
        assert_eq!(acme.len(), 2);

        let (mid, _) = db
            .list_products(ProductQuery {
                min_price_cents: Some(20000),
                max_price_cents: Some(100000),
                ..page()
            })
            .await
            .unwrap();
        let names: Vec<_> = mid.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Laptop Air", "Desk Chair"]);
    }

    #[tokio::test]
    async fn test_name_filter_treats_wildcards_literally() {
        let db = seeded().await;

        let (hits, _) = db
            .list_products(ProductQuery {
                name: Some("100%_".to_string()),
                ..page()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let (none, _) = db
            .list_products(ProductQuery {
                name: Some("%".to_string()),
                category: Some("Electronics".to_string()),
                ..page()
            })
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete_product() {
        let db = seeded().await;

        let updated = db
            .update_product(
                1,
                UpdateProduct {
                    price_cents: Some(119999),
                    description: Some(Some("Refreshed".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.price_cents, 119999);
        assert_eq!(updated.name, "Laptop Pro");

        let fetched = db.get_product(1).await.unwrap().unwrap();
        assert_eq!(fetched.description.as_deref(), Some("Refreshed"));

        assert!(db.update_product(999, UpdateProduct::default()).await.unwrap().is_none());

        assert!(db.delete_product(1).await.unwrap());
        assert!(!db.delete_product(1).await.unwrap());
        assert!(db.get_product(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_negative_price_rejected() {
        let db = Database::in_memory().await.unwrap();
        let result = db.insert_product(product("Broken", "Misc", "None", -1)).await;
        assert!(matches!(result, Err(DbError::InvalidInput(_))));
        assert!(!db.has_products().await.unwrap());
    }
}

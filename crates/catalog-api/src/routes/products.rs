//! Product catalog routes

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use catalog_db::{NewProduct, ProductQuery, UpdateProduct};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{
    CreateProductRequest, ProductListQuery, ProductListResponse, ProductResponse,
    UpdateProductRequest, clamp_page,
};

// ==================== Input Validation ====================

/// Maximum length for free-text product fields
const MAX_FIELD_LENGTH: usize = 200;

fn validate_field(label: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{} cannot be empty", label)));
    }
    if value.len() > MAX_FIELD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "{} exceeds maximum length of {} characters",
            label, MAX_FIELD_LENGTH
        )));
    }
    Ok(())
}

fn validate_price(price_cents: i64) -> Result<(), ApiError> {
    if price_cents < 0 {
        return Err(ApiError::BadRequest("Price cannot be negative".to_string()));
    }
    Ok(())
}

/// Convert a major-unit price bound to minor units
fn to_cents(label: &str, price: f64) -> Result<i64, ApiError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ApiError::BadRequest(format!("Invalid {}: {}", label, price)));
    }
    Ok((price * 100.0).round() as i64)
}

// ==================== Product Routes ====================

/// GET /api/v1/products
async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ProductListQuery>,
) -> Result<Json<ProductListResponse>, ApiError> {
    let (offset, limit) = clamp_page(params.offset, params.limit);
    let query = ProductQuery {
        name: params.name.filter(|s| !s.is_empty()),
        category: params.category.filter(|s| !s.is_empty()),
        brand: params.brand.filter(|s| !s.is_empty()),
        min_price_cents: params.min_price.map(|p| to_cents("min_price", p)).transpose()?,
        max_price_cents: params.max_price.map(|p| to_cents("max_price", p)).transpose()?,
        offset,
        limit,
    };

    let (products, total) = state.db.list_products(query).await?;

    Ok(Json(ProductListResponse {
        products: products.into_iter().map(ProductResponse::from).collect(),
        total,
        offset,
        limit,
    }))
}

/// GET /api/v1/products/{id}
async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state
        .db
        .get_product(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product: {}", id)))?;

    Ok(Json(product.into()))
}

/// POST /api/v1/products (Admin only)
async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    validate_field("Name", &request.name)?;
    validate_field("Category", &request.category)?;
    validate_field("Brand", &request.brand)?;
    validate_price(request.price_cents)?;

    debug!("Creating product: {}", request.name);

    let product = state
        .db
        .insert_product(NewProduct {
            name: request.name,
            description: request.description,
            category: request.category,
            brand: request.brand,
            price_cents: request.price_cents,
        })
        .await?;

    info!(
        "{} created product {} ({})",
        state.auth.current_username(),
        product.id,
        product.name
    );

    Ok((StatusCode::CREATED, Json(product.into())))
}

/// PUT /api/v1/products/{id} (Admin only)
async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    if let Some(name) = &request.name {
        validate_field("Name", name)?;
    }
    if let Some(category) = &request.category {
        validate_field("Category", category)?;
    }
    if let Some(brand) = &request.brand {
        validate_field("Brand", brand)?;
    }
    if let Some(price_cents) = request.price_cents {
        validate_price(price_cents)?;
    }

    let product = state
        .db
        .update_product(
            id,
            UpdateProduct {
                name: request.name,
                description: request.description.map(Some),
                category: request.category,
                brand: request.brand,
                price_cents: request.price_cents,
            },
        )
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product: {}", id)))?;

    info!("{} updated product {}", state.auth.current_username(), id);

    Ok(Json(product.into()))
}

/// DELETE /api/v1/products/{id} (Admin only)
async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !state.db.delete_product(id).await? {
        return Err(ApiError::NotFound(format!("Product: {}", id)));
    }

    info!("{} deleted product {}", state.auth.current_username(), id);
    Ok(StatusCode::NO_CONTENT)
}

/// Create product routes
///
/// Write access is enforced by the route policy, not here.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/products", get(list_products).post(create_product))
        .route(
            "/api/v1/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db::{Category, DbPool, Product, ProductWithFarmer, Unit, User};
use crate::error::{MarketError, MarketResult};
use crate::state::AppState;

/// Pagination defaults shared by every listing endpoint.
pub fn page_params(page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(10).clamp(1, 100);
    (page, limit, (page - 1) * limit)
}

pub fn total_pages(total: i64, limit: i64) -> i64 {
    (total + limit - 1) / limit
}

#[derive(Debug, Deserialize, Default)]
pub struct ProductFilter {
    pub city: Option<String>,
    pub category: Option<Category>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub products: Vec<ProductWithFarmer>,
    pub total_pages: i64,
    pub current_page: i64,
    pub total: i64,
}

/// Public catalog listing. Only available products, newest first; city and
/// free-text search are case-insensitive substring matches.
pub async fn list_products_internal(
    pool: &DbPool,
    filter: &ProductFilter,
) -> MarketResult<ProductPage> {
    let (page, limit, offset) = page_params(filter.page, filter.limit);

    let products = sqlx::query_as::<_, ProductWithFarmer>(
        "SELECT p.*, u.name AS farmer_name, u.city AS farmer_city
         FROM products p
         JOIN users u ON u.id = p.farmer_id
         WHERE p.is_available = TRUE
           AND ($1::text IS NULL OR p.city ILIKE '%' || $1 || '%')
           AND ($2 IS NULL OR p.category = $2)
           AND ($3::text IS NULL OR p.name ILIKE '%' || $3 || '%' OR p.description ILIKE '%' || $3 || '%')
         ORDER BY p.created_at DESC
         LIMIT $4 OFFSET $5",
    )
    .bind(&filter.city)
    .bind(filter.category)
    .bind(&filter.search)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM products p
         WHERE p.is_available = TRUE
           AND ($1::text IS NULL OR p.city ILIKE '%' || $1 || '%')
           AND ($2 IS NULL OR p.category = $2)
           AND ($3::text IS NULL OR p.name ILIKE '%' || $3 || '%' OR p.description ILIKE '%' || $3 || '%')",
    )
    .bind(&filter.city)
    .bind(filter.category)
    .bind(&filter.search)
    .fetch_one(pool)
    .await?;

    Ok(ProductPage {
        products,
        total_pages: total_pages(total.0, limit),
        current_page: page,
        total: total.0,
    })
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> MarketResult<Json<ProductPage>> {
    Ok(Json(list_products_internal(&state.pool, &filter).await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> MarketResult<Json<ProductWithFarmer>> {
    let product = sqlx::query_as::<_, ProductWithFarmer>(
        "SELECT p.*, u.name AS farmer_name, u.city AS farmer_city, u.phone AS farmer_phone
         FROM products p
         JOIN users u ON u.id = p.farmer_id
         WHERE p.id = $1",
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| MarketError::NotFound("Product not found".to_string()))?;

    Ok(Json(product))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub quantity: i32,
    pub unit: Unit,
    pub category: Category,
    pub image: String,
    pub city: Option<String>,
}

/// Field checks shared by create and update. The image reference is only
/// required at creation, so update passes `None`.
fn validate_product_fields(
    name: &str,
    description: &str,
    price: f64,
    quantity: i32,
    image: Option<&str>,
) -> MarketResult<()> {
    if name.trim().is_empty() {
        return Err(MarketError::Validation("Product name is required".to_string()));
    }
    if description.trim().is_empty() {
        return Err(MarketError::Validation("Description is required".to_string()));
    }
    if !price.is_finite() || price < 0.0 {
        return Err(MarketError::Validation(
            "Price must be a positive number".to_string(),
        ));
    }
    if quantity < 1 {
        return Err(MarketError::Validation(
            "Quantity must be at least 1".to_string(),
        ));
    }
    if let Some(image) = image {
        if image.trim().is_empty() {
            return Err(MarketError::Validation(
                "Product image is required".to_string(),
            ));
        }
    }
    Ok(())
}

pub async fn create_product_internal(
    pool: &DbPool,
    farmer: &User,
    payload: CreateProductRequest,
) -> MarketResult<Product> {
    farmer.require_approved_farmer()?;
    validate_product_fields(
        &payload.name,
        &payload.description,
        payload.price,
        payload.quantity,
        Some(&payload.image),
    )?;

    let city = match payload.city {
        Some(c) if !c.trim().is_empty() => c,
        _ => farmer.city.clone(),
    };

    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products (farmer_id, name, description, price, quantity, unit, category, image, city)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING *",
    )
    .bind(farmer.id)
    .bind(payload.name.trim())
    .bind(payload.description.trim())
    .bind(payload.price)
    .bind(payload.quantity)
    .bind(payload.unit)
    .bind(payload.category)
    .bind(&payload.image)
    .bind(&city)
    .fetch_one(pool)
    .await?;

    tracing::info!("Farmer {} listed product {}", farmer.id, product.id);
    Ok(product)
}

pub async fn create_product(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateProductRequest>,
) -> MarketResult<(StatusCode, Json<Value>)> {
    let product = create_product_internal(&state.pool, &user, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Product created successfully", "product": product })),
    ))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub quantity: i32,
    pub unit: Unit,
    pub category: Category,
    pub city: Option<String>,
    pub is_available: Option<bool>,
}

pub async fn update_product_internal(
    pool: &DbPool,
    farmer: &User,
    id: Uuid,
    payload: UpdateProductRequest,
) -> MarketResult<Product> {
    farmer.require_approved_farmer()?;
    validate_product_fields(
        &payload.name,
        &payload.description,
        payload.price,
        payload.quantity,
        None,
    )?;

    let existing = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| MarketError::NotFound("Product not found".to_string()))?;

    if existing.farmer_id != farmer.id {
        return Err(MarketError::Forbidden(
            "Not authorized to update this product".to_string(),
        ));
    }

    // Quantity is at least 1 here, so availability is whatever the farmer
    // says, defaulting to purchasable.
    let is_available = payload.is_available.unwrap_or(true);

    let product = sqlx::query_as::<_, Product>(
        "UPDATE products SET
            name = $1, description = $2, price = $3, quantity = $4,
            unit = $5, category = $6, city = COALESCE($7, city),
            is_available = $8, updated_at = NOW()
         WHERE id = $9
         RETURNING *",
    )
    .bind(payload.name.trim())
    .bind(payload.description.trim())
    .bind(payload.price)
    .bind(payload.quantity)
    .bind(payload.unit)
    .bind(payload.category)
    .bind(&payload.city)
    .bind(is_available)
    .bind(id)
    .fetch_one(pool)
    .await?;

    Ok(product)
}

pub async fn update_product(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> MarketResult<Json<Value>> {
    let product = update_product_internal(&state.pool, &user, id, payload).await?;
    Ok(Json(
        json!({ "message": "Product updated successfully", "product": product }),
    ))
}

pub async fn delete_product_internal(pool: &DbPool, farmer: &User, id: Uuid) -> MarketResult<()> {
    farmer.require_approved_farmer()?;

    let existing = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| MarketError::NotFound("Product not found".to_string()))?;

    if existing.farmer_id != farmer.id {
        return Err(MarketError::Forbidden(
            "Not authorized to delete this product".to_string(),
        ));
    }

    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn delete_product(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> MarketResult<Json<Value>> {
    delete_product_internal(&state.pool, &user, id).await?;
    Ok(Json(json!({ "message": "Product deleted successfully" })))
}

/// The farmer's own listing, availability-unfiltered so they can see
/// sold-out and disabled products too.
pub async fn list_my_products(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> MarketResult<Json<Vec<Product>>> {
    user.require_approved_farmer()?;

    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE farmer_id = $1 ORDER BY created_at DESC",
    )
    .bind(user.id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(products))
}

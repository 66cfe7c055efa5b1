use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::product::{page_params, total_pages};
use crate::db::{
    Category, DbPool, Order, OrderStatus, PaymentStatus, ProductWithFarmer, Role, User,
};
use crate::error::{MarketError, MarketResult};
use crate::state::AppState;

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
struct UserCounts {
    total_users: i64,
    total_farmers: i64,
    pending_farmers: i64,
    total_customers: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
struct RecentUser {
    id: Uuid,
    name: String,
    email: String,
    role: Role,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
struct RecentOrder {
    id: Uuid,
    total_amount: f64,
    status: OrderStatus,
    order_date: DateTime<Utc>,
    customer_name: String,
    farmer_name: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
struct RecentProduct {
    id: Uuid,
    name: String,
    price: f64,
    category: Category,
    created_at: DateTime<Utc>,
    farmer_name: String,
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> MarketResult<Json<Value>> {
    user.require_admin()?;

    let counts = sqlx::query_as::<_, UserCounts>(
        "SELECT
            COUNT(*) AS total_users,
            COUNT(*) FILTER (WHERE role = 'farmer') AS total_farmers,
            COUNT(*) FILTER (WHERE role = 'farmer' AND NOT is_approved) AS pending_farmers,
            COUNT(*) FILTER (WHERE role = 'customer') AS total_customers
         FROM users",
    )
    .fetch_one(&state.pool)
    .await?;

    let total_products: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
        .fetch_one(&state.pool)
        .await?;
    let total_orders: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
        .fetch_one(&state.pool)
        .await?;

    let recent_users = sqlx::query_as::<_, RecentUser>(
        "SELECT id, name, email, role, created_at FROM users ORDER BY created_at DESC LIMIT 5",
    )
    .fetch_all(&state.pool)
    .await?;

    let recent_orders = sqlx::query_as::<_, RecentOrder>(
        "SELECT o.id, o.total_amount, o.status, o.order_date,
                c.name AS customer_name, f.name AS farmer_name
         FROM orders o
         JOIN users c ON c.id = o.customer_id
         JOIN users f ON f.id = o.farmer_id
         ORDER BY o.order_date DESC LIMIT 5",
    )
    .fetch_all(&state.pool)
    .await?;

    let recent_products = sqlx::query_as::<_, RecentProduct>(
        "SELECT p.id, p.name, p.price, p.category, p.created_at, u.name AS farmer_name
         FROM products p
         JOIN users u ON u.id = p.farmer_id
         ORDER BY p.created_at DESC LIMIT 5",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(json!({
        "statistics": {
            "totalUsers": counts.total_users,
            "totalFarmers": counts.total_farmers,
            "pendingFarmers": counts.pending_farmers,
            "totalCustomers": counts.total_customers,
            "totalProducts": total_products.0,
            "totalOrders": total_orders.0,
        },
        "recentActivities": {
            "users": recent_users,
            "orders": recent_orders,
            "products": recent_products,
        }
    })))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserFilter {
    pub role: Option<Role>,
    pub is_approved: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(filter): Query<UserFilter>,
) -> MarketResult<Json<Value>> {
    user.require_admin()?;
    let (page, limit, offset) = page_params(filter.page, filter.limit);

    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users
         WHERE ($1 IS NULL OR role = $1)
           AND ($2::boolean IS NULL OR is_approved = $2)
         ORDER BY created_at DESC
         LIMIT $3 OFFSET $4",
    )
    .bind(filter.role)
    .bind(filter.is_approved)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM users
         WHERE ($1 IS NULL OR role = $1)
           AND ($2::boolean IS NULL OR is_approved = $2)",
    )
    .bind(filter.role)
    .bind(filter.is_approved)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(json!({
        "users": users,
        "totalPages": total_pages(total.0, limit),
        "currentPage": page,
        "total": total.0,
    })))
}

pub async fn pending_farmers(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> MarketResult<Json<Vec<User>>> {
    user.require_admin()?;

    let farmers = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE role = 'farmer' AND NOT is_approved ORDER BY created_at DESC",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(farmers))
}

pub async fn approve_farmer_internal(pool: &DbPool, farmer_id: Uuid) -> MarketResult<User> {
    let farmer = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(farmer_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| MarketError::NotFound("Farmer not found".to_string()))?;

    if farmer.role != Role::Farmer {
        return Err(MarketError::Validation("User is not a farmer".to_string()));
    }
    if farmer.is_approved {
        return Err(MarketError::Validation(
            "Farmer is already approved".to_string(),
        ));
    }

    let approved = sqlx::query_as::<_, User>(
        "UPDATE users SET is_approved = TRUE WHERE id = $1 RETURNING *",
    )
    .bind(farmer_id)
    .fetch_one(pool)
    .await?;

    tracing::info!("Approved farmer {}", approved.email);
    Ok(approved)
}

pub async fn approve_farmer(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> MarketResult<Json<Value>> {
    user.require_admin()?;
    let farmer = approve_farmer_internal(&state.pool, id).await?;
    Ok(Json(
        json!({ "message": "Farmer approved successfully", "farmer": farmer }),
    ))
}

/// Rejection deletes the account outright; the products and orders cascade
/// away with it.
pub async fn reject_farmer_internal(pool: &DbPool, farmer_id: Uuid) -> MarketResult<()> {
    let farmer = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(farmer_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| MarketError::NotFound("Farmer not found".to_string()))?;

    if farmer.role != Role::Farmer {
        return Err(MarketError::Validation("User is not a farmer".to_string()));
    }

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(farmer_id)
        .execute(pool)
        .await?;

    tracing::info!("Rejected and deleted farmer {}", farmer.email);
    Ok(())
}

pub async fn reject_farmer(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> MarketResult<Json<Value>> {
    user.require_admin()?;
    reject_farmer_internal(&state.pool, id).await?;
    Ok(Json(
        json!({ "message": "Farmer rejected and account deleted successfully" }),
    ))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AdminProductFilter {
    pub category: Option<Category>,
    pub city: Option<String>,
    pub is_available: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Admin catalog view: availability-unfiltered unless asked.
pub async fn list_products(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(filter): Query<AdminProductFilter>,
) -> MarketResult<Json<Value>> {
    user.require_admin()?;
    let (page, limit, offset) = page_params(filter.page, filter.limit);

    let products = sqlx::query_as::<_, ProductWithFarmer>(
        "SELECT p.*, u.name AS farmer_name, u.city AS farmer_city
         FROM products p
         JOIN users u ON u.id = p.farmer_id
         WHERE ($1 IS NULL OR p.category = $1)
           AND ($2::text IS NULL OR p.city ILIKE '%' || $2 || '%')
           AND ($3::boolean IS NULL OR p.is_available = $3)
         ORDER BY p.created_at DESC
         LIMIT $4 OFFSET $5",
    )
    .bind(filter.category)
    .bind(&filter.city)
    .bind(filter.is_available)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM products p
         WHERE ($1 IS NULL OR p.category = $1)
           AND ($2::text IS NULL OR p.city ILIKE '%' || $2 || '%')
           AND ($3::boolean IS NULL OR p.is_available = $3)",
    )
    .bind(filter.category)
    .bind(&filter.city)
    .bind(filter.is_available)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(json!({
        "products": products,
        "totalPages": total_pages(total.0, limit),
        "currentPage": page,
        "total": total.0,
    })))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AdminOrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_orders(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(filter): Query<AdminOrderFilter>,
) -> MarketResult<Json<Value>> {
    user.require_admin()?;
    let (page, limit, offset) = page_params(filter.page, filter.limit);

    let orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders
         WHERE ($1 IS NULL OR status = $1)
           AND ($2 IS NULL OR payment_status = $2)
         ORDER BY order_date DESC
         LIMIT $3 OFFSET $4",
    )
    .bind(filter.status)
    .bind(filter.payment_status)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM orders
         WHERE ($1 IS NULL OR status = $1)
           AND ($2 IS NULL OR payment_status = $2)",
    )
    .bind(filter.status)
    .bind(filter.payment_status)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(json!({
        "orders": orders,
        "totalPages": total_pages(total.0, limit),
        "currentPage": page,
        "total": total.0,
    })))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> MarketResult<Json<Value>> {
    user.require_admin()?;

    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(MarketError::NotFound("Product not found".to_string()));
    }

    Ok(Json(json!({ "message": "Product deleted successfully" })))
}

/// Deleting a user removes their products and every order naming them as
/// either party, via the schema's ON DELETE CASCADE chains.
pub async fn delete_user_internal(pool: &DbPool, user_id: Uuid) -> MarketResult<()> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(MarketError::NotFound("User not found".to_string()));
    }
    Ok(())
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> MarketResult<Json<Value>> {
    user.require_admin()?;
    delete_user_internal(&state.pool, id).await?;
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};

use crate::db::{DbPool, User};
use crate::error::MarketResult;
use crate::state::AppState;

/// Per-role rollups, recomputed fresh on every call. No materialized
/// aggregates exist at this system's scale.

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CustomerStats {
    pub total_orders: i64,
    pub pending_orders: i64,
    pub completed_orders: i64,
    pub cancelled_orders: i64,
    pub total_spent: f64,
}

pub async fn customer_stats_internal(pool: &DbPool, user: &User) -> MarketResult<CustomerStats> {
    user.require_customer()?;

    let stats = sqlx::query_as::<_, CustomerStats>(
        "SELECT
            COUNT(*) AS total_orders,
            COUNT(*) FILTER (WHERE status = 'pending') AS pending_orders,
            COUNT(*) FILTER (WHERE status = 'delivered') AS completed_orders,
            COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled_orders,
            COALESCE(SUM(total_amount) FILTER (WHERE payment_status = 'completed'), 0) AS total_spent
         FROM orders
         WHERE customer_id = $1",
    )
    .bind(user.id)
    .fetch_one(pool)
    .await?;

    Ok(stats)
}

pub async fn customer_stats(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> MarketResult<Json<CustomerStats>> {
    Ok(Json(customer_stats_internal(&state.pool, &user).await?))
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FarmerStats {
    pub total_products: i64,
    pub active_products: i64,
    pub total_orders: i64,
    pub pending_orders: i64,
    pub completed_orders: i64,
    pub total_earnings: f64,
}

pub async fn farmer_stats_internal(pool: &DbPool, user: &User) -> MarketResult<FarmerStats> {
    user.require_approved_farmer()?;

    let stats = sqlx::query_as::<_, FarmerStats>(
        "SELECT
            (SELECT COUNT(*) FROM products WHERE farmer_id = $1) AS total_products,
            (SELECT COUNT(*) FROM products WHERE farmer_id = $1 AND is_available = TRUE) AS active_products,
            COUNT(o.*) AS total_orders,
            COUNT(o.*) FILTER (WHERE o.status = 'pending') AS pending_orders,
            COUNT(o.*) FILTER (WHERE o.status = 'delivered') AS completed_orders,
            COALESCE(SUM(o.total_amount) FILTER (WHERE o.payment_status = 'completed'), 0) AS total_earnings
         FROM orders o
         WHERE o.farmer_id = $1",
    )
    .bind(user.id)
    .fetch_one(pool)
    .await?;

    Ok(stats)
}

pub async fn farmer_stats(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> MarketResult<Json<FarmerStats>> {
    Ok(Json(farmer_stats_internal(&state.pool, &user).await?))
}

pub async fn customer_profile(Extension(user): Extension<User>) -> MarketResult<Json<User>> {
    user.require_customer()?;
    Ok(Json(user))
}

pub async fn farmer_profile(Extension(user): Extension<User>) -> MarketResult<Json<User>> {
    user.require_approved_farmer()?;
    Ok(Json(user))
}

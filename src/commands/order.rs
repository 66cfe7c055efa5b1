use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db::{DbPool, Order, OrderItem, OrderStatus, PaymentStatus, Product, User};
use crate::error::{MarketError, MarketResult};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryAddress {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub pincode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub products: Vec<OrderLineRequest>,
    pub delivery_address: DeliveryAddress,
    pub delivery_instructions: Option<String>,
    pub notes: Option<String>,
}

/// Public profile of the other party on an order.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Counterparty {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub phone: String,
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub products: Vec<OrderItem>,
    pub farmer: Option<Counterparty>,
    pub customer: Option<Counterparty>,
}

async fn fetch_counterparty(pool: &DbPool, id: Uuid) -> MarketResult<Option<Counterparty>> {
    let party = sqlx::query_as::<_, Counterparty>(
        "SELECT id, name, city, phone, address FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(party)
}

async fn fetch_items(pool: &DbPool, order_id: Uuid) -> MarketResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT i.product_id, i.quantity, i.price,
                p.name AS product_name, p.unit AS product_unit, p.image AS product_image
         FROM order_items i
         LEFT JOIN products p ON p.id = i.product_id
         WHERE i.order_id = $1
         ORDER BY i.id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(items)
}

pub async fn get_order_view(pool: &DbPool, order_id: Uuid) -> MarketResult<OrderView> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| MarketError::NotFound("Order not found".to_string()))?;

    let products = fetch_items(pool, order.id).await?;
    let farmer = fetch_counterparty(pool, order.farmer_id).await?;
    let customer = fetch_counterparty(pool, order.customer_id).await?;

    Ok(OrderView {
        order,
        products,
        farmer,
        customer,
    })
}

/// Places an order for a customer. The whole sequence runs in one database
/// transaction: validation, the single-farmer check, server-side pricing,
/// conditional stock decrements and the order insert commit together or not
/// at all. The decrement carries a `quantity >= n` guard, so two orders
/// racing on the same product cannot both drain it below zero.
pub async fn place_order_internal(
    pool: &DbPool,
    customer: &User,
    payload: PlaceOrderRequest,
) -> MarketResult<OrderView> {
    customer.require_customer()?;

    if payload.products.is_empty() {
        return Err(MarketError::Validation(
            "At least one product is required".to_string(),
        ));
    }
    if payload.products.iter().any(|l| l.quantity < 1) {
        return Err(MarketError::Validation(
            "Quantity must be at least 1".to_string(),
        ));
    }
    if payload.delivery_address.street.trim().is_empty() {
        return Err(MarketError::Validation(
            "Delivery address is required".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let mut farmer_id: Option<Uuid> = None;
    let mut total_amount = 0.0_f64;
    let mut lines: Vec<(Uuid, i32, f64)> = Vec::with_capacity(payload.products.len());

    for line in &payload.products {
        let product =
            sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 FOR UPDATE")
                .bind(line.product_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| {
                    MarketError::Validation(format!("Product {} not found", line.product_id))
                })?;

        if !product.is_available {
            return Err(MarketError::Validation(format!(
                "Product {} is not available",
                product.name
            )));
        }
        if product.quantity < line.quantity {
            return Err(MarketError::Validation(format!(
                "Insufficient quantity for {}",
                product.name
            )));
        }

        // All line items must come from one farmer.
        match farmer_id {
            None => farmer_id = Some(product.farmer_id),
            Some(f) if f != product.farmer_id => {
                return Err(MarketError::Validation(
                    "All products must be from the same farmer".to_string(),
                ));
            }
            Some(_) => {}
        }

        // The live product price is the only price that counts.
        total_amount += product.price * f64::from(line.quantity);
        lines.push((product.id, line.quantity, product.price));
    }

    let farmer_id = farmer_id.ok_or_else(|| {
        MarketError::Validation("At least one product is required".to_string())
    })?;

    for (product_id, quantity, _) in &lines {
        let result = sqlx::query(
            "UPDATE products
             SET quantity = quantity - $1,
                 is_available = (quantity - $1) > 0,
                 updated_at = NOW()
             WHERE id = $2 AND quantity >= $1",
        )
        .bind(quantity)
        .bind(product_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MarketError::Validation(format!(
                "Insufficient quantity for product {}",
                product_id
            )));
        }
    }

    let expected_delivery = Utc::now() + Duration::days(3);

    let order_id: Uuid = sqlx::query_scalar(
        "INSERT INTO orders (customer_id, farmer_id, total_amount,
                             delivery_street, delivery_city, delivery_state, delivery_pincode,
                             delivery_instructions, notes, expected_delivery)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING id",
    )
    .bind(customer.id)
    .bind(farmer_id)
    .bind(total_amount)
    .bind(&payload.delivery_address.street)
    .bind(&payload.delivery_address.city)
    .bind(&payload.delivery_address.state)
    .bind(&payload.delivery_address.pincode)
    .bind(&payload.delivery_instructions)
    .bind(&payload.notes)
    .bind(expected_delivery)
    .fetch_one(&mut *tx)
    .await?;

    for (product_id, quantity, price) in &lines {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, quantity, price)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(order_id)
        .bind(product_id)
        .bind(quantity)
        .bind(price)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        "Customer {} placed order {} ({} lines, total {})",
        customer.id,
        order_id,
        lines.len(),
        total_amount
    );

    get_order_view(pool, order_id).await
}

pub async fn place_order(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<PlaceOrderRequest>,
) -> MarketResult<(StatusCode, Json<Value>)> {
    let order = place_order_internal(&state.pool, &user, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Order placed successfully", "order": order })),
    ))
}

async fn list_order_views(pool: &DbPool, orders: Vec<Order>) -> MarketResult<Vec<OrderView>> {
    let mut views = Vec::with_capacity(orders.len());
    for order in orders {
        let products = fetch_items(pool, order.id).await?;
        let farmer = fetch_counterparty(pool, order.farmer_id).await?;
        let customer = fetch_counterparty(pool, order.customer_id).await?;
        views.push(OrderView {
            order,
            products,
            farmer,
            customer,
        });
    }
    Ok(views)
}

pub async fn my_orders_customer(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> MarketResult<Json<Vec<OrderView>>> {
    user.require_customer()?;

    let orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE customer_id = $1 ORDER BY order_date DESC",
    )
    .bind(user.id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(list_order_views(&state.pool, orders).await?))
}

pub async fn my_orders_farmer(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> MarketResult<Json<Vec<OrderView>>> {
    user.require_approved_farmer()?;

    let orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE farmer_id = $1 ORDER BY order_date DESC",
    )
    .bind(user.id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(list_order_views(&state.pool, orders).await?))
}

/// Order detail, readable only by the two parties on it or an admin.
pub async fn get_order_internal(
    pool: &DbPool,
    user: &User,
    order_id: Uuid,
) -> MarketResult<OrderView> {
    let view = get_order_view(pool, order_id).await?;

    if view.order.customer_id != user.id && view.order.farmer_id != user.id && !user.is_admin() {
        return Err(MarketError::Forbidden(
            "Not authorized to view this order".to_string(),
        ));
    }

    Ok(view)
}

pub async fn get_order(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> MarketResult<Json<OrderView>> {
    Ok(Json(get_order_internal(&state.pool, &user, id).await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub notes: Option<String>,
}

/// Status change by the owning farmer. The machine is deliberately lenient:
/// any status in the enum can be written at any time. `delivered` is the only
/// transition with a side effect, stamping the actual delivery time.
pub async fn update_order_status_internal(
    pool: &DbPool,
    farmer: &User,
    order_id: Uuid,
    status: &str,
    notes: Option<String>,
) -> MarketResult<Order> {
    farmer.require_approved_farmer()?;

    let status: OrderStatus = status.parse()?;

    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| MarketError::NotFound("Order not found".to_string()))?;

    if order.farmer_id != farmer.id {
        return Err(MarketError::Forbidden(
            "Not authorized to update this order".to_string(),
        ));
    }

    let updated = sqlx::query_as::<_, Order>(
        "UPDATE orders SET
            status = $1,
            notes = COALESCE($2, notes),
            actual_delivery = CASE WHEN $1 = 'delivered'::order_status THEN NOW() ELSE actual_delivery END
         WHERE id = $3
         RETURNING *",
    )
    .bind(status)
    .bind(&notes)
    .bind(order_id)
    .fetch_one(pool)
    .await?;

    Ok(updated)
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> MarketResult<Json<Value>> {
    let order =
        update_order_status_internal(&state.pool, &user, id, &payload.status, payload.notes)
            .await?;
    let view = get_order_view(&state.pool, order.id).await?;
    Ok(Json(
        json!({ "message": "Order status updated successfully", "order": view }),
    ))
}

/// Payment stub: the owning customer flips the payment status to completed.
/// No money moves here.
pub async fn complete_payment_internal(
    pool: &DbPool,
    customer: &User,
    order_id: Uuid,
) -> MarketResult<Order> {
    customer.require_customer()?;

    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| MarketError::NotFound("Order not found".to_string()))?;

    if order.customer_id != customer.id {
        return Err(MarketError::Forbidden(
            "Not authorized to update this order".to_string(),
        ));
    }

    let updated = sqlx::query_as::<_, Order>(
        "UPDATE orders SET payment_status = $1 WHERE id = $2 RETURNING *",
    )
    .bind(PaymentStatus::Completed)
    .bind(order_id)
    .fetch_one(pool)
    .await?;

    Ok(updated)
}

pub async fn complete_payment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> MarketResult<Json<Value>> {
    let order = complete_payment_internal(&state.pool, &user, id).await?;
    let view = get_order_view(&state.pool, order.id).await?;
    Ok(Json(
        json!({ "message": "Payment completed successfully", "order": view }),
    ))
}

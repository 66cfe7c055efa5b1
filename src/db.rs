use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{FromRow, Pool, Postgres};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{MarketError, MarketResult};

pub type DbPool = Pool<Postgres>;

pub async fn init_pool_with_options(opts: PgConnectOptions) -> MarketResult<DbPool> {
    // connect_lazy_with returns the pool immediately. It does not validate connection.
    Ok(PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .idle_timeout(std::time::Duration::from_secs(120))
        .connect_lazy_with(opts))
}

pub async fn init_pool(database_url: &str) -> MarketResult<DbPool> {
    let opts = PgConnectOptions::from_str(database_url)
        .map_err(|e| MarketError::Internal(format!("Invalid DB URL: {}", e)))?
        .ssl_mode(PgSslMode::Prefer);

    init_pool_with_options(opts).await
}

pub async fn init_database(pool: &DbPool) -> MarketResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    ensure_seeds(pool).await?;
    Ok(())
}

/// Seeds the admin account when the users table has none.
async fn ensure_seeds(pool: &DbPool) -> MarketResult<()> {
    let admin_email =
        std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@agrolink.local".to_string());
    let admin_password = std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());

    let admin_exists: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'admin'")
        .fetch_one(pool)
        .await
        .unwrap_or((0,));

    if admin_exists.0 == 0 {
        let hash = bcrypt::hash(&admin_password, bcrypt::DEFAULT_COST)?;
        sqlx::query(
            "INSERT INTO users (name, email, password_hash, role, is_approved)
             VALUES ('Admin', $1, $2, 'admin', TRUE) ON CONFLICT (email) DO NOTHING",
        )
        .bind(&admin_email)
        .bind(hash)
        .execute(pool)
        .await?;
        tracing::info!("Seeded admin account {}", admin_email);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    Customer,
    Farmer,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "product_unit", rename_all = "lowercase")]
pub enum Unit {
    Kg,
    Dozen,
    Piece,
    Bundle,
    Quintal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "product_category", rename_all = "lowercase")]
pub enum Category {
    Vegetables,
    Fruits,
    Grains,
    Dairy,
    Poultry,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl FromStr for OrderStatus {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(MarketError::Validation(format!("Invalid status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub phone: String,
    pub city: String,
    pub address: Option<String>,
    pub farm_description: Option<String>,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn require_customer(&self) -> MarketResult<()> {
        match self.role {
            Role::Customer => Ok(()),
            Role::Farmer | Role::Admin => Err(MarketError::Forbidden(
                "Access denied. Customer role required.".to_string(),
            )),
        }
    }

    pub fn require_farmer(&self) -> MarketResult<()> {
        match self.role {
            Role::Farmer => Ok(()),
            Role::Customer | Role::Admin => Err(MarketError::Forbidden(
                "Access denied. Farmer role required.".to_string(),
            )),
        }
    }

    /// Unapproved farmers may log in and browse, but everything that lists
    /// products or receives orders requires the admin approval flag.
    pub fn require_approved_farmer(&self) -> MarketResult<()> {
        match self.role {
            Role::Farmer if self.is_approved => Ok(()),
            _ => Err(MarketError::Forbidden(
                "Access denied. Approved farmer role required.".to_string(),
            )),
        }
    }

    pub fn require_admin(&self) -> MarketResult<()> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Customer | Role::Farmer => Err(MarketError::Forbidden(
                "Access denied. Admin role required.".to_string(),
            )),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub quantity: i32,
    pub unit: Unit,
    pub category: Category,
    pub image: String,
    pub city: String,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product row joined with the owning farmer's public profile fields.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductWithFarmer {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub quantity: i32,
    pub unit: Unit,
    pub category: Category,
    pub image: String,
    pub city: String,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub farmer_name: String,
    pub farmer_city: String,
    #[sqlx(default)]
    pub farmer_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub farmer_id: Uuid,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub delivery_street: String,
    pub delivery_city: String,
    pub delivery_state: String,
    pub delivery_pincode: String,
    pub delivery_instructions: Option<String>,
    pub notes: Option<String>,
    pub order_date: DateTime<Utc>,
    pub expected_delivery: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
}

/// Line item joined with whatever survives of the referenced product.
/// The price column is the snapshot taken at placement time, not the
/// product's live price.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: f64,
    #[sqlx(default)]
    pub product_name: Option<String>,
    #[sqlx(default)]
    pub product_unit: Option<Unit>,
    #[sqlx(default)]
    pub product_image: Option<String>,
}

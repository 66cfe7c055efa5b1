use axum::{extract::State, http::StatusCode, Extension, Json};
use bcrypt::{hash, verify, DEFAULT_COST};
use serde::{Deserialize, Serialize};

use crate::db::{DbPool, Role, User};
use crate::error::{MarketError, MarketResult};
use crate::middleware::auth::issue_token;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub city: String,
    pub address: Option<String>,
    pub farm_description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

pub async fn register_internal(pool: &DbPool, payload: RegisterRequest) -> MarketResult<User> {
    if payload.name.trim().is_empty() {
        return Err(MarketError::Validation("Name is required".to_string()));
    }
    if payload.email.trim().is_empty() || !payload.email.contains('@') {
        return Err(MarketError::Validation("A valid email is required".to_string()));
    }
    if payload.password.len() < 6 {
        return Err(MarketError::Validation(
            "Password must be at least 6 characters".to_string(),
        ));
    }
    if payload.role == Role::Admin {
        return Err(MarketError::Validation(
            "Cannot register as admin".to_string(),
        ));
    }

    let existing: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&payload.email)
        .fetch_one(pool)
        .await?;
    if existing.0 > 0 {
        return Err(MarketError::Validation(
            "User already exists with this email".to_string(),
        ));
    }

    let password_hash = hash(&payload.password, DEFAULT_COST)?;

    // Farmers start unapproved and stay invisible to the marketplace until an
    // admin signs off on them.
    let is_approved = payload.role == Role::Customer;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (name, email, password_hash, role, phone, city, address, farm_description, is_approved)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING *",
    )
    .bind(payload.name.trim())
    .bind(payload.email.trim().to_lowercase())
    .bind(&password_hash)
    .bind(payload.role)
    .bind(&payload.phone)
    .bind(&payload.city)
    .bind(&payload.address)
    .bind(&payload.farm_description)
    .bind(is_approved)
    .fetch_one(pool)
    .await?;

    tracing::info!("Registered {:?} account {}", user.role, user.email);
    Ok(user)
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> MarketResult<(StatusCode, Json<AuthResponse>)> {
    let user = register_internal(&state.pool, payload).await?;
    let token = issue_token(user.id)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> MarketResult<Json<AuthResponse>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(payload.email.trim().to_lowercase())
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| MarketError::Auth("Invalid credentials".to_string()))?;

    if !verify(&payload.password, &user.password_hash)? {
        return Err(MarketError::Auth("Invalid credentials".to_string()));
    }

    let token = issue_token(user.id)?;
    Ok(Json(AuthResponse { token, user }))
}

pub async fn me(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub farm_description: Option<String>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<UpdateProfileRequest>,
) -> MarketResult<Json<User>> {
    if let Some(name) = &payload.name {
        if name.trim().is_empty() {
            return Err(MarketError::Validation("Name cannot be empty".to_string()));
        }
    }

    let updated = sqlx::query_as::<_, User>(
        "UPDATE users SET
            name = COALESCE($1, name),
            phone = COALESCE($2, phone),
            city = COALESCE($3, city),
            address = COALESCE($4, address),
            farm_description = COALESCE($5, farm_description)
         WHERE id = $6
         RETURNING *",
    )
    .bind(&payload.name)
    .bind(&payload.phone)
    .bind(&payload.city)
    .bind(&payload.address)
    .bind(&payload.farm_description)
    .bind(user.id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(updated))
}

use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::User;
use crate::error::{MarketError, MarketResult};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

pub fn get_jwt_secret() -> Vec<u8> {
    std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using insecure default!");
            "agrolink-development-secret-replace-me".to_string()
        })
        .into_bytes()
}

pub fn issue_token(user_id: Uuid) -> MarketResult<String> {
    let claims = Claims {
        sub: user_id,
        exp: (Utc::now() + Duration::days(30)).timestamp() as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(&get_jwt_secret()),
    )?;
    Ok(token)
}

pub fn decode_token(token: &str) -> MarketResult<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(&get_jwt_secret()),
        &Validation::default(),
    )
    .map_err(|_| MarketError::Auth("Token is not valid".to_string()))?;
    Ok(data.claims)
}

/// Routes reachable without a bearer token: registration, login and the
/// public product catalog. Everything else under /api re-resolves the
/// caller's identity from the database on every request.
fn is_public_route(method: &Method, path: &str) -> bool {
    if *method == Method::POST && (path == "/api/auth/register" || path == "/api/auth/login") {
        return true;
    }
    *method == Method::GET
        && (path == "/api/products"
            || (path.starts_with("/api/products/") && !path.starts_with("/api/products/farmer")))
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, MarketError> {
    let path = request.uri().path().to_string();

    if !path.starts_with("/api/") || is_public_route(request.method(), &path) {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| MarketError::Auth("No token, authorization denied".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| MarketError::Auth("No token, authorization denied".to_string()))?;

    let claims = decode_token(token)?;

    // Stateless by construction: one user lookup per request, no server-side
    // session. A token for a deleted account fails here.
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(claims.sub)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| MarketError::Auth("Token is not valid".to_string()))?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

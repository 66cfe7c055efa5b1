use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Bcrypt error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("Token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type MarketResult<T> = Result<T, MarketError>;

impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            MarketError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            MarketError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg),
            MarketError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            MarketError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            other => {
                tracing::error!("Internal error: {:?}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

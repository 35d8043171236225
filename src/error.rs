use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShopError {
    // Configuration errors
    #[error("Missing environment variable '{name}'")]
    MissingEnv { name: String },

    #[error("Invalid value for '{name}': {message}")]
    ConfigValidation { name: String, message: String },

    // Checkout errors
    #[error("Missing required parameter")]
    MissingParameter,

    #[error("Unknown price id: {price}")]
    UnknownPrice { price: String },

    // Webhook errors
    #[error("Invalid webhook payload: {message}")]
    InvalidPayload { message: String },

    #[error("Invalid webhook signature: {message}")]
    InvalidSignature { message: String },

    // Auth errors
    #[error("Missing or incorrect shop secret")]
    Unauthorized,

    // Upstream errors
    #[error("Stripe API error: {message}")]
    Stripe { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<reqwest::Error> for ShopError {
    fn from(err: reqwest::Error) -> Self {
        ShopError::Stripe {
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ShopError {
    fn into_response(self) -> Response {
        let status = match &self {
            ShopError::MissingParameter
            | ShopError::UnknownPrice { .. }
            | ShopError::InvalidPayload { .. }
            | ShopError::InvalidSignature { .. }
            | ShopError::Stripe { .. } => StatusCode::BAD_REQUEST,
            ShopError::Unauthorized => StatusCode::UNAUTHORIZED,
            ShopError::MissingEnv { .. }
            | ShopError::ConfigValidation { .. }
            | ShopError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Internal detail stays in the logs
            tracing::error!("Request failed: {}", self);
            return (
                status,
                Json(serde_json::json!({ "error": "internal error" })),
            )
                .into_response();
        }

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ShopError>;

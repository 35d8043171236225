//! Shared-secret authentication for the checkout endpoint
//!
//! The checkout endpoint is only ever called server-to-server by the
//! bot, so a static bearer secret is the whole auth story.

use axum::http::HeaderMap;

use crate::error::{Result, ShopError};

/// Extract the bearer token from the Authorization header
fn get_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Reject requests that do not carry the configured shop secret
pub fn require_shop_secret(headers: &HeaderMap, secret: &str) -> Result<()> {
    match get_bearer_token(headers) {
        Some(provided) if provided == secret => Ok(()),
        _ => Err(ShopError::Unauthorized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::AUTHORIZATION;

    #[test]
    fn test_correct_secret_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer hunter2".parse().unwrap());
        assert!(require_shop_secret(&headers, "hunter2").is_ok());
    }

    #[test]
    fn test_missing_header_rejected() {
        let headers = HeaderMap::new();
        assert!(require_shop_secret(&headers, "hunter2").is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer wrong".parse().unwrap());
        assert!(require_shop_secret(&headers, "hunter2").is_err());
    }

    #[test]
    fn test_non_bearer_scheme_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Basic hunter2".parse().unwrap());
        assert!(require_shop_secret(&headers, "hunter2").is_err());
    }
}

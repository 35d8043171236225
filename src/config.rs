//! Environment-driven service configuration

use std::collections::HashMap;

use crate::error::{Result, ShopError};

/// Shop service configuration, loaded once at startup
#[derive(Clone)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,
    /// Stripe API secret key (sk_...)
    pub stripe_secret_key: String,
    /// Webhook signing secret (whsec_...)
    pub signing_secret: String,
    /// Static bearer secret required on POST /shop/checkout
    pub shop_secret: String,
    /// Tier name -> Stripe price id
    pub prices: HashMap<String, String>,
    /// Where Stripe sends the buyer after a completed checkout
    pub success_url: String,
    /// Where Stripe sends the buyer after an abandoned checkout
    pub cancel_url: String,
    /// Listen port
    pub port: u16,
    /// Stripe API base URL (overridable so tests can point at a mock)
    pub api_base: String,
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ShopError::MissingEnv {
        name: name.to_string(),
    })
}

impl AppConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        let prices_json = require_env("STRIPE_PRICES")?;
        let prices: HashMap<String, String> =
            serde_json::from_str(&prices_json).map_err(|e| ShopError::ConfigValidation {
                name: "STRIPE_PRICES".to_string(),
                message: format!("expected a JSON object of tier -> price id: {}", e),
            })?;
        if prices.is_empty() {
            return Err(ShopError::ConfigValidation {
                name: "STRIPE_PRICES".to_string(),
                message: "at least one tier must be configured".to_string(),
            });
        }

        let port = match std::env::var("SHOP_PORT") {
            Ok(s) => s.parse().map_err(|_| ShopError::ConfigValidation {
                name: "SHOP_PORT".to_string(),
                message: format!("'{}' is not a valid port", s),
            })?,
            Err(_) => 8020,
        };

        Ok(Self {
            database_url: require_env("DATABASE_URL")?,
            stripe_secret_key: require_env("STRIPE_SECRET_KEY")?,
            signing_secret: require_env("STRIPE_SIGNING_SECRET")?,
            shop_secret: require_env("SHOP_SECRET")?,
            prices,
            success_url: std::env::var("SUCCESS_URL")
                .unwrap_or_else(|_| "https://overseer-bot.net/guilds".to_string()),
            cancel_url: std::env::var("CANCEL_URL")
                .unwrap_or_else(|_| "https://overseer-bot.net".to_string()),
            port,
            api_base: std::env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
        })
    }

    /// Whether `price` is one of the configured tier price ids
    pub fn is_known_price(&self, price: &str) -> bool {
        self.prices.values().any(|p| p == price)
    }

    /// Reverse lookup from a Stripe price id to its tier name
    pub fn tier_for_price(&self, price: &str) -> Option<&str> {
        self.prices
            .iter()
            .find(|(_, p)| p.as_str() == price)
            .map(|(tier, _)| tier.as_str())
    }
}

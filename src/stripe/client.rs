//! Stripe API client for hosted checkout sessions

use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, ShopError};

/// Thin client over the Stripe REST API
#[derive(Clone)]
pub struct StripeClient {
    secret_key: String,
    api_base: String,
    http_client: reqwest::Client,
}

/// Parameters for a hosted checkout session
pub struct CreateCheckoutSession<'a> {
    /// Stripe price id for the single line item
    pub price: &'a str,
    /// Our generated checkout reference, echoed back in the webhook
    pub client_reference_id: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

/// The slice of Stripe's checkout session response we use
#[derive(Deserialize, Debug)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted payment page the buyer is redirected to
    pub url: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

impl StripeClient {
    pub fn new(secret_key: &str, api_base: &str) -> Self {
        Self {
            secret_key: secret_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    /// Create a subscription-mode hosted checkout session with a
    /// single line item.
    pub async fn create_checkout_session(
        &self,
        params: CreateCheckoutSession<'_>,
    ) -> Result<CheckoutSession> {
        let response = self
            .http_client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&[
                ("payment_method_types[0]", "card"),
                ("line_items[0][price]", params.price),
                ("line_items[0][quantity]", "1"),
                ("mode", "subscription"),
                ("success_url", params.success_url),
                ("cancel_url", params.cancel_url),
                ("client_reference_id", params.client_reference_id),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(ShopError::Stripe {
                message: format!("{}: {}", status, message),
            });
        }

        let session: CheckoutSession = response.json().await?;
        debug!("Created checkout session {}", session.id);
        Ok(session)
    }
}

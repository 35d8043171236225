//! Router and handlers for the shop endpoints

use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::auth::require_shop_secret;
use crate::config::AppConfig;
use crate::db;
use crate::error::{Result, ShopError};
use crate::stripe::{self, CreateCheckoutSession, StripeClient};

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub stripe: StripeClient,
    pub pool: PgPool,
}

/// Checkout request body sent by the bot
#[derive(Deserialize)]
pub struct CheckoutRequest {
    user_id: Option<i64>,
    guild_id: Option<i64>,
    price: Option<String>,
}

/// Build the `/shop` router
pub fn shop_router(state: AppState) -> Router {
    Router::new()
        .route("/shop", get(health))
        .route("/shop/checkout", post(checkout))
        .route("/shop/webhook", post(webhook))
        .route("/shop/success", get(success))
        .route("/shop/cancel", get(cancel))
        .fallback(not_found)
        .with_state(state)
}

/// Start the web server for the shop endpoints
pub async fn start_web_server(state: AppState) -> anyhow::Result<()> {
    let port = state.config.port;
    let app = shop_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Shop server listening on http://{}", addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> &'static str {
    "Overseer shop running"
}

/// GET /shop/success - where Stripe sends the buyer after paying
async fn success(State(state): State<AppState>) -> Redirect {
    Redirect::to(&state.config.success_url)
}

/// GET /shop/cancel - where Stripe sends the buyer after backing out
async fn cancel(State(state): State<AppState>) -> Redirect {
    Redirect::to(&state.config.cancel_url)
}

/// JSON 404 for unknown routes
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "status_code": 404 })),
    )
}

/// POST /shop/checkout - create a hosted checkout session
///
/// Mints a reference, creates the Stripe session with it as
/// `client_reference_id`, and stores the pending-state row so the
/// webhook can later tie the payment back to a user/guild pair.
async fn checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<serde_json::Value>> {
    require_shop_secret(&headers, &state.config.shop_secret)?;

    let (user_id, guild_id, price) = match (req.user_id, req.guild_id, req.price) {
        (Some(u), Some(g), Some(p)) => (u, g, p),
        _ => {
            debug!("Checkout request missing required parameter");
            return Err(ShopError::MissingParameter);
        }
    };

    if !state.config.is_known_price(&price) {
        return Err(ShopError::UnknownPrice { price });
    }

    let reference = Uuid::new_v4().to_string();
    debug!(
        "Creating checkout session for user {} with reference {}",
        user_id, reference
    );

    let session = state
        .stripe
        .create_checkout_session(CreateCheckoutSession {
            price: &price,
            client_reference_id: &reference,
            success_url: &state.config.success_url,
            cancel_url: &state.config.cancel_url,
        })
        .await?;

    db::insert_checkout_state(&state.pool, &reference, user_id, guild_id, &price).await?;
    info!(
        "Stored pending checkout {} for user {} in guild {}",
        session.id, user_id, guild_id
    );

    Ok(Json(serde_json::json!({ "url": session.url })))
}

/// POST /shop/webhook - verified Stripe event deliveries
///
/// Signature or payload failures are 400. Domain mismatches on a
/// verified event (unpaid session, orphan reference, unknown price)
/// are acknowledged with 200 so Stripe does not keep retrying.
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let sig_header = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ShopError::InvalidSignature {
            message: "missing stripe-signature header".to_string(),
        })?;

    let event = stripe::construct_event(
        &body,
        sig_header,
        &state.config.signing_secret,
        stripe::unix_now(),
    )?;
    debug!("Processed webhook event: {}", event.event_type);

    match event.event_type.as_str() {
        "checkout.session.completed" => handle_checkout_completed(&state, &event).await,
        "customer.subscription.created" | "customer.subscription.updated" => {
            handle_subscription_change(&state, &event).await
        }
        "customer.subscription.deleted" => handle_subscription_deleted(&state, &event).await,
        _ => Ok(ack("Ignored")),
    }
}

fn ack(message: &'static str) -> Response {
    (StatusCode::OK, message).into_response()
}

async fn handle_checkout_completed(state: &AppState, event: &stripe::Event) -> Result<Response> {
    let session = event.checkout_session()?;

    if session.payment_status.as_deref() != Some("paid") {
        return Ok(ack("Unpaid session"));
    }

    let Some(reference) = session.client_reference_id.as_deref() else {
        return Ok(ack("Missing state"));
    };

    // Lookup and upsert share one transaction; early returns roll back
    let mut tx = state.pool.begin().await?;

    let Some(pending) = db::fetch_checkout_state(&mut *tx, reference).await? else {
        warn!("No pending checkout for reference {}", reference);
        return Ok(ack("Orphan state"));
    };

    let Some(tier) = state.config.tier_for_price(&pending.stripe_price) else {
        warn!(
            "Pending checkout {} carries unconfigured price {}",
            reference, pending.stripe_price
        );
        return Ok(ack("Unknown price"));
    };

    info!("Payment complete for Discord user {}", pending.user_id);
    db::upsert_patron(
        &mut *tx,
        pending.user_id,
        pending.guild_id,
        session.customer.as_deref(),
        tier,
    )
    .await?;
    tx.commit().await?;

    Ok(ack("Success"))
}

async fn handle_subscription_change(state: &AppState, event: &stripe::Event) -> Result<Response> {
    let sub = event.subscription()?;

    let Some(price_id) = sub.first_price_id() else {
        return Ok(ack("No items"));
    };
    let Some(tier) = state.config.tier_for_price(price_id) else {
        return Ok(ack("Unknown price"));
    };
    let Some(customer) = sub.customer.as_deref() else {
        return Ok(ack("Missing customer"));
    };

    let updated = db::update_patron_tier(&state.pool, customer, tier).await?;
    if updated > 0 {
        info!("Payment complete for customer {}", customer);
    }

    Ok(ack("Success"))
}

async fn handle_subscription_deleted(state: &AppState, event: &stripe::Event) -> Result<Response> {
    let sub = event.subscription()?;

    let Some(customer) = sub.customer.as_deref() else {
        return Ok(ack("Missing customer"));
    };

    let removed = db::delete_patron_by_customer(&state.pool, customer).await?;
    if removed > 0 {
        info!("Removed patron rows for cancelled customer {}", customer);
    }

    Ok(ack("Success"))
}

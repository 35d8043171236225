//! PostgreSQL access for checkout state and patron rows
//!
//! One pending `checkout_states` row per checkout attempt, written
//! before the buyer is redirected to Stripe, and one `patrons` row
//! per confirmed payment.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgExecutor, PgPool};

use crate::error::Result;

/// Pending-state row written on checkout-session creation
#[derive(Debug, Clone, FromRow)]
pub struct CheckoutState {
    pub state: String,
    pub user_id: i64,
    pub guild_id: i64,
    pub stripe_price: String,
    pub created_at: DateTime<Utc>,
}

/// Durable entitlement row written once a payment is confirmed
#[derive(Debug, Clone, FromRow)]
pub struct Patron {
    pub user_id: i64,
    pub guild_id: i64,
    pub customer_id: Option<String>,
    pub tier: String,
    pub subscribed_at: DateTime<Utc>,
}

/// Connect to PostgreSQL
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(60))
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Insert the pending-state row for a freshly minted checkout reference
pub async fn insert_checkout_state(
    pool: &PgPool,
    state: &str,
    user_id: i64,
    guild_id: i64,
    stripe_price: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO checkout_states (state, user_id, guild_id, stripe_price) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(state)
    .bind(user_id)
    .bind(guild_id)
    .bind(stripe_price)
    .execute(pool)
    .await?;
    Ok(())
}

/// Look up the pending-state row for a webhook's client reference id.
/// Takes any executor so the webhook can run it inside a transaction.
pub async fn fetch_checkout_state<'e>(
    executor: impl PgExecutor<'e>,
    state: &str,
) -> Result<Option<CheckoutState>> {
    let row = sqlx::query_as::<_, CheckoutState>(
        "SELECT state, user_id, guild_id, stripe_price, created_at \
         FROM checkout_states WHERE state = $1",
    )
    .bind(state)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

/// Record a confirmed payment. A returning patron gets their customer
/// id and tier refreshed rather than a duplicate row.
pub async fn upsert_patron<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
    guild_id: i64,
    customer_id: Option<&str>,
    tier: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO patrons (user_id, guild_id, customer_id, tier, subscribed_at) \
         VALUES ($1, $2, $3, $4, now()) \
         ON CONFLICT (user_id, guild_id) \
         DO UPDATE SET customer_id = EXCLUDED.customer_id, tier = EXCLUDED.tier",
    )
    .bind(user_id)
    .bind(guild_id)
    .bind(customer_id)
    .bind(tier)
    .execute(executor)
    .await?;
    Ok(())
}

/// Move an existing patron to a new tier after a subscription change
pub async fn update_patron_tier(pool: &PgPool, customer_id: &str, tier: &str) -> Result<u64> {
    let result = sqlx::query("UPDATE patrons SET tier = $1 WHERE customer_id = $2")
        .bind(tier)
        .bind(customer_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Revoke entitlement after a subscription is cancelled
pub async fn delete_patron_by_customer(pool: &PgPool, customer_id: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM patrons WHERE customer_id = $1")
        .bind(customer_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

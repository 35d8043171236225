//! Web server for the shop endpoints
//!
//! Hosts the checkout and webhook endpoints the Overseer bot and
//! Stripe talk to, plus the buyer-facing success/cancel redirects.

mod auth;
mod server;

pub use auth::require_shop_secret;
pub use server::{shop_router, start_web_server, AppState};

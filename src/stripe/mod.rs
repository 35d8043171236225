//! Minimal Stripe surface: hosted checkout session creation and
//! webhook signature verification.
//!
//! Only the two calls this service actually makes are implemented;
//! the wire formats follow Stripe's published API and webhook
//! contracts.

mod client;
mod webhook;

pub use client::{CheckoutSession, CreateCheckoutSession, StripeClient};
pub use webhook::{
    construct_event, unix_now, verify_signature, CheckoutSessionObject, Event,
    SubscriptionObject, SIGNATURE_TOLERANCE_SECS,
};

//! Stripe checkout/webhook companion service for the Overseer bot
//!
//! Brokers hosted checkout sessions on behalf of the bot and turns
//! verified `checkout.session.completed` webhooks into patron rows.

pub mod config;
pub mod db;
pub mod error;
pub mod stripe;
pub mod web;

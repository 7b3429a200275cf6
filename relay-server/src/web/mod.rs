//! Web server module for handling inbound Stripe webhooks.
//!
//! This module provides a small web server that:
//! - Receives `POST /stripe-webhook` deliveries as raw bytes
//! - Verifies the `Stripe-Signature` header
//! - Sends the activation email for completed checkouts
//! - Acknowledges with 200 whether or not the email went out

pub mod handlers;

pub use handlers::{health, router, stripe_webhook, AppState, HealthResponse, WEBHOOK_PATH};

//! Nexus Relay - Stripe checkout webhook to activation email.
//!
//! ## Architecture
//!
//! ```text
//! Stripe → POST /stripe-webhook → verify signature → decode event → SendGrid
//! ```
//!
//! Every request ends in one response: 200 once the signature is valid and
//! the event decodes, 400 otherwise. Email failures are logged, never
//! reported back to Stripe.

pub mod config;
pub mod email;
pub mod web;
pub mod webhook;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use email::{ActivationEmail, Notifier, SendError, SendGridClient};
pub use web::{router, AppState};
pub use webhook::{handle_webhook, Dispatch, RawWebhook, SignatureVerifier, WebhookError};

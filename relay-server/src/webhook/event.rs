//! Stripe event envelope and the checkout-session payload.
//!
//! Only the fields this service reads are modelled; everything else in
//! Stripe's event schema is ignored on decode.

use serde::Deserialize;

/// Decoded webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Event identifier (`evt_...`). Not used for deduplication.
    #[serde(default)]
    pub id: Option<String>,

    /// Event kind tag, e.g. `checkout.session.completed`
    #[serde(rename = "type")]
    pub event_type: String,

    pub data: EventData,
}

/// Container for the object the event is about.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    /// Kept untyped until the kind is known.
    pub object: serde_json::Value,
}

/// Event kinds this service distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    CheckoutSessionCompleted,
    Other(String),
}

impl EventKind {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "checkout.session.completed" | "checkout_session_completed" => {
                Self::CheckoutSessionCompleted
            }
            other => Self::Other(other.to_string()),
        }
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        EventKind::parse(&self.event_type)
    }

    /// Decode `data.object` as a checkout session.
    pub fn checkout_session(&self) -> Result<CheckoutSession, serde_json::Error> {
        CheckoutSession::deserialize(&self.data.object)
    }
}

/// Checkout session object (`data.object` of `checkout.session.completed`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutSession {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,

    /// Email supplied when the session was created, if any
    #[serde(default)]
    pub customer_email: Option<String>,
}

/// Contact details collected during checkout.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
}

impl CheckoutSession {
    /// Customer email, preferring the address collected at checkout.
    ///
    /// Blank strings are treated as absent.
    pub fn customer_email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.as_deref())
            .and_then(non_blank)
            .or_else(|| self.customer_email.as_deref().and_then(non_blank))
    }
}

fn non_blank(email: &str) -> Option<&str> {
    let email = email.trim();
    (!email.is_empty()).then_some(email)
}

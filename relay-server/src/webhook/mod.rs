//! Stripe webhook verification and dispatch.
//!
//! ## Processing Flow
//!
//! ```text
//! RawWebhook --verify()--> VerifiedPayload --decode()--> Event --dispatch()--> Dispatch
//! ```
//!
//! Only a [`VerifiedPayload`] can be decoded, and only [`RawWebhook::verify`]
//! can produce one, so the body is never parsed before its signature checks out.

pub mod event;
pub mod signature;

use axum::body::Bytes;
use axum::http::HeaderMap;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::email::{Notifier, SendError};

pub use event::{CheckoutSession, CustomerDetails, Event, EventData, EventKind};
pub use signature::{
    compute_signature, signature_header, SignatureError, SignatureHeader, SignatureVerifier,
    DEFAULT_TOLERANCE, SIGNATURE_HEADER,
};

/// Errors that end a webhook request with a 400.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("{0}")]
    SignatureInvalid(#[from] SignatureError),

    #[error("malformed event payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

/// Request body exactly as received, with the signature header if present.
#[derive(Debug, Clone)]
pub struct RawWebhook {
    body: Bytes,
    signature: Result<String, SignatureError>,
}

impl RawWebhook {
    pub fn new(body: impl Into<Bytes>, signature: Option<&str>) -> Self {
        Self {
            body: body.into(),
            signature: signature
                .map(str::to_string)
                .ok_or(SignatureError::MissingHeader),
        }
    }

    /// Take the signature from request headers.
    ///
    /// A header that is present but not visible ASCII is malformed, not missing.
    pub fn from_headers(body: impl Into<Bytes>, headers: &HeaderMap) -> Self {
        let signature = match headers.get(SIGNATURE_HEADER) {
            None => Err(SignatureError::MissingHeader),
            Some(value) => value
                .to_str()
                .map(str::to_string)
                .map_err(|_| SignatureError::MalformedHeader("non-ascii header")),
        };
        Self {
            body: body.into(),
            signature,
        }
    }

    /// Check the signature against the untouched body bytes.
    pub fn verify(self, verifier: &SignatureVerifier) -> Result<VerifiedPayload, WebhookError> {
        let RawWebhook { body, signature } = self;
        let signature = signature?;
        verifier.verify(&body, &signature)?;
        Ok(VerifiedPayload { body })
    }
}

/// Body whose signature has been checked.
#[derive(Debug, Clone)]
pub struct VerifiedPayload {
    body: Bytes,
}

impl VerifiedPayload {
    pub fn decode(&self) -> Result<Event, WebhookError> {
        serde_json::from_slice(&self.body).map_err(|e| {
            warn!(error = %e, body_length = self.body.len(), "webhook_payload_malformed");
            WebhookError::MalformedPayload(e)
        })
    }
}

/// What happened to a verified event.
#[derive(Debug)]
pub enum Dispatch {
    /// Activation email accepted by the provider.
    Notified { recipient: String },
    /// Send attempted and failed. Recorded, never surfaced to the gateway.
    NotifyFailed { recipient: String, error: SendError },
    /// Completed checkout without a customer email.
    NoRecipient,
    /// Event kind this service does not act on.
    Ignored { kind: String },
}

/// Route a verified event.
///
/// At most one notification is attempted. A send failure is folded into
/// [`Dispatch::NotifyFailed`] rather than returned as an error.
pub async fn dispatch(event: &Event, notifier: &dyn Notifier) -> Result<Dispatch, WebhookError> {
    match event.kind() {
        EventKind::CheckoutSessionCompleted => {
            let session = event.checkout_session().map_err(|e| {
                warn!(event_id = ?event.id, error = %e, "checkout_session_malformed");
                WebhookError::MalformedPayload(e)
            })?;

            let Some(recipient) = session.customer_email() else {
                info!(
                    event_id = ?event.id,
                    session_id = ?session.id,
                    "checkout_completed_without_email"
                );
                return Ok(Dispatch::NoRecipient);
            };
            let recipient = recipient.to_string();

            info!(
                event_id = ?event.id,
                session_id = ?session.id,
                recipient = %recipient,
                "checkout_completed_sending_activation"
            );

            match notifier.send_activation_email(&recipient).await {
                Ok(()) => {
                    info!(recipient = %recipient, "activation_email_sent");
                    Ok(Dispatch::Notified { recipient })
                }
                Err(error) => {
                    error!(recipient = %recipient, error = %error, "activation_email_failed");
                    Ok(Dispatch::NotifyFailed { recipient, error })
                }
            }
        }
        EventKind::Other(kind) => {
            debug!(event_id = ?event.id, kind = %kind, "webhook_event_ignored");
            Ok(Dispatch::Ignored { kind })
        }
    }
}

/// Verify, decode and dispatch one webhook delivery.
pub async fn handle_webhook(
    raw: RawWebhook,
    verifier: &SignatureVerifier,
    notifier: &dyn Notifier,
) -> Result<Dispatch, WebhookError> {
    let verified = raw.verify(verifier)?;
    let event = verified.decode()?;

    info!(event_id = ?event.id, event_type = %event.event_type, "webhook_event_verified");

    dispatch(&event, notifier).await
}

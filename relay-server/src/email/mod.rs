//! Activation email construction and delivery.
//!
//! The message is fixed: only the recipient varies. Delivery is behind the
//! [`Notifier`] trait so the webhook dispatcher can be exercised without a
//! network.

pub mod sendgrid;

use async_trait::async_trait;
use thiserror::Error;

pub use sendgrid::SendGridClient;

/// Subject line of the activation email.
pub const ACTIVATION_SUBJECT: &str = "Gracias por su compra. Active su licencia de Nexus";

/// HTML body of the activation email.
pub const ACTIVATION_HTML: &str = "\
<h1>Gracias por su compra en Nexus</h1>
<p>Por favor, revise su bandeja de correo electrónico para completar la activación de su licencia.</p>
<p>Su siguiente paso es... (Aquí puedes poner las instrucciones o el enlace)</p>
";

/// Reasons an email submission fails.
#[derive(Debug, Error)]
pub enum SendError {
    /// Network failure or timeout before the provider answered.
    #[error("email transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider answered with a non-success status.
    #[error("email provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// A fully built outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationEmail {
    pub to: String,
    pub from: String,
    pub subject: &'static str,
    pub html: &'static str,
}

impl ActivationEmail {
    pub fn new(to: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            from: from.into(),
            subject: ACTIVATION_SUBJECT,
            html: ACTIVATION_HTML,
        }
    }
}

/// Sends activation emails.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Submit the activation email for `recipient`.
    ///
    /// Success means the provider accepted the message, not that it was delivered.
    async fn send_activation_email(&self, recipient: &str) -> Result<(), SendError>;
}

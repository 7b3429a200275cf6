//! SendGrid v3 mail-send client.
//!
//! Reference: https://www.twilio.com/docs/sendgrid/api-reference/mail-send/mail-send

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, warn};
use url::Url;

use super::{ActivationEmail, Notifier, SendError};
use crate::Config;

const MAIL_SEND_PATH: &str = "v3/mail/send";

/// Longest provider error body kept in a `SendError`.
const ERROR_BODY_PREVIEW: usize = 500;

/// Notifier backed by the SendGrid HTTP API.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone)]
pub struct SendGridClient {
    client: Client,
    api_key: String,
    endpoint: Url,
    from: String,
}

impl SendGridClient {
    pub fn new(
        api_key: impl Into<String>,
        api_base: &Url,
        from: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut base = api_base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let endpoint = base
            .join(MAIL_SEND_PATH)
            .context("Failed to build SendGrid endpoint URL")?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint,
            from: from.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.sendgrid_api_key.clone(),
            &config.sendgrid_api_base,
            config.email_from.clone(),
            config.request_timeout(),
        )
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Submit a built message.
    pub async fn send(&self, email: &ActivationEmail) -> Result<(), SendError> {
        let body = MailSendRequest::from(email);

        let response = match self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                error!(
                    to = %email.to,
                    is_timeout = e.is_timeout(),
                    error = %e,
                    "sendgrid_request_failed"
                );
                return Err(SendError::Transport(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            info!(to = %email.to, status_code = status.as_u16(), "sendgrid_accepted");
            return Ok(());
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(status_code = status.as_u16(), error = %e, "sendgrid_error_body_unreadable");
                String::new()
            }
        };
        let preview: String = text.chars().take(ERROR_BODY_PREVIEW).collect();

        error!(
            to = %email.to,
            status_code = status.as_u16(),
            body_preview = %preview,
            "sendgrid_rejected"
        );

        Err(SendError::Rejected {
            status: status.as_u16(),
            body: preview,
        })
    }
}

#[async_trait]
impl Notifier for SendGridClient {
    async fn send_activation_email(&self, recipient: &str) -> Result<(), SendError> {
        let email = ActivationEmail::new(recipient, self.from.clone());
        self.send(&email).await
    }
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Serialize)]
struct MailSendRequest<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Address<'a>,
    subject: &'a str,
    content: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: [Address<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

impl<'a> From<&'a ActivationEmail> for MailSendRequest<'a> {
    fn from(email: &'a ActivationEmail) -> Self {
        MailSendRequest {
            personalizations: [Personalization {
                to: [Address { email: &email.to }],
            }],
            from: Address { email: &email.from },
            subject: email.subject,
            content: [Content {
                content_type: "text/html",
                value: email.html,
            }],
        }
    }
}

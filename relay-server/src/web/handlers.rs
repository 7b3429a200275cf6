//! HTTP endpoint handlers.
//!
//! The webhook handler takes the body as raw bytes so the signature is
//! checked against exactly what Stripe sent. Its only responses are an
//! empty 200 once the event is accepted, or a plain-text 400.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::email::Notifier;
use crate::webhook::{handle_webhook, Dispatch, RawWebhook, SignatureVerifier, SIGNATURE_HEADER};
use crate::Config;

/// Path Stripe is configured to deliver to.
pub const WEBHOOK_PATH: &str = "/stripe-webhook";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub verifier: Arc<SignatureVerifier>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(config: Config, notifier: Arc<dyn Notifier>) -> Self {
        let verifier = SignatureVerifier::new(
            config.stripe_webhook_secret.clone(),
            config.signature_tolerance(),
        );
        Self {
            config: Arc::new(config),
            verifier: Arc::new(verifier),
            notifier,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(WEBHOOK_PATH, post(stripe_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Stripe Webhook
// =============================================================================

/// Stripe webhook endpoint.
///
/// This endpoint:
/// 1. Verifies the `Stripe-Signature` header against the raw body
/// 2. Decodes the event and sends the activation email when applicable
/// 3. Returns 200 regardless of email outcome
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    info!(
        body_length = body.len(),
        has_signature = headers.contains_key(SIGNATURE_HEADER),
        "stripe_webhook_received"
    );

    let raw = RawWebhook::from_headers(body, &headers);

    match handle_webhook(raw, &state.verifier, state.notifier.as_ref()).await {
        Ok(outcome) => {
            match &outcome {
                Dispatch::Notified { .. } => info!("stripe_webhook_handled"),
                // Acknowledged anyway: Stripe retries on receipt, not on email delivery.
                Dispatch::NotifyFailed { recipient, .. } => {
                    warn!(recipient = %recipient, "stripe_webhook_acknowledged_despite_send_failure")
                }
                Dispatch::NoRecipient | Dispatch::Ignored { .. } => {}
            }
            StatusCode::OK.into_response()
        }
        Err(e) => {
            warn!(error = %e, "stripe_webhook_rejected");
            (StatusCode::BAD_REQUEST, format!("Webhook Error: {}", e)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_EMAIL_FROM;
    use crate::webhook::signature::unix_now;
    use crate::webhook::signature_header;
    use crate::webhook::testing::RecordingNotifier;
    use axum::body::{to_bytes, Body};
    use axum::http::{HeaderValue, Request};
    use tower::ServiceExt;
    use url::Url;

    const SECRET: &str = "whsec_http_test";
    const BODY: &str = r#"{"type":"checkout_session_completed","data":{"object":{"customer_details":{"email":"buyer@example.com"}}}}"#;

    fn test_config() -> Config {
        Config {
            stripe_secret_key: "sk_test".to_string(),
            stripe_webhook_secret: SECRET.to_string(),
            signature_tolerance_secs: 300,
            sendgrid_api_key: "SG.test".to_string(),
            sendgrid_api_base: Url::parse("http://127.0.0.1:1").unwrap(),
            email_from: DEFAULT_EMAIL_FROM.to_string(),
            request_timeout_ms: 1000,
            port: 0,
        }
    }

    fn app(notifier: Arc<RecordingNotifier>) -> Router {
        router(AppState::new(test_config(), notifier))
    }

    fn webhook_request(body: &str, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(WEBHOOK_PATH)
            .header("content-type", "application/json");
        if let Some(sig) = signature {
            builder = builder.header("Stripe-Signature", sig);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_valid_checkout_returns_empty_200() {
        let notifier = Arc::new(RecordingNotifier::default());
        let sig = signature_header(SECRET, unix_now(), BODY.as_bytes());

        let response = app(notifier.clone())
            .oneshot(webhook_request(BODY, Some(sig)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "");
        assert_eq!(notifier.recipients(), vec!["buyer@example.com"]);
    }

    #[tokio::test]
    async fn test_invalid_signature_returns_400() {
        let notifier = Arc::new(RecordingNotifier::default());
        let sig = format!("t={},v1={}", unix_now(), "00".repeat(32));

        let response = app(notifier.clone())
            .oneshot(webhook_request(BODY, Some(sig)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let text = body_string(response).await;
        assert!(text.starts_with("Webhook Error:"));
        assert!(text.contains("No signatures found"));
        assert!(notifier.recipients().is_empty());
    }

    #[tokio::test]
    async fn test_missing_signature_returns_400() {
        let notifier = Arc::new(RecordingNotifier::default());

        let response = app(notifier.clone())
            .oneshot(webhook_request(BODY, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("stripe-signature"));
        assert!(notifier.recipients().is_empty());
    }

    #[tokio::test]
    async fn test_non_ascii_signature_returns_400() {
        let notifier = Arc::new(RecordingNotifier::default());
        let request = Request::builder()
            .method("POST")
            .uri(WEBHOOK_PATH)
            .header("content-type", "application/json")
            .header(
                "Stripe-Signature",
                HeaderValue::from_bytes(b"t=1,v1=\xff").unwrap(),
            )
            .body(Body::from(BODY))
            .unwrap();

        let response = app(notifier.clone()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let text = body_string(response).await;
        assert!(text.contains("non-ascii header"));
        assert!(!text.contains("No stripe-signature header value"));
        assert!(notifier.recipients().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_still_returns_200() {
        let notifier = Arc::new(RecordingNotifier::rejecting());
        let sig = signature_header(SECRET, unix_now(), BODY.as_bytes());

        let response = app(notifier.clone())
            .oneshot(webhook_request(BODY, Some(sig)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(notifier.recipients().len(), 1);
    }

    #[tokio::test]
    async fn test_signed_malformed_payload_returns_400() {
        let notifier = Arc::new(RecordingNotifier::default());
        let body = r#"{"type":"checkout.session.completed"}"#;
        let sig = signature_header(SECRET, unix_now(), body.as_bytes());

        let response = app(notifier.clone())
            .oneshot(webhook_request(body, Some(sig)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("malformed event payload"));
    }

    #[tokio::test]
    async fn test_health() {
        let notifier = Arc::new(RecordingNotifier::default());

        let response = app(notifier)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, r#"{"status":"ok"}"#);
    }
}

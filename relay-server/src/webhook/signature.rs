//! Stripe webhook signature verification.
//!
//! Stripe signs webhook requests using HMAC-SHA256.
//! Reference: https://docs.stripe.com/webhooks#verify-manually
//!
//! The `Stripe-Signature` header has the form `t=<unix secs>,v1=<hex>[,v1=<hex>...]`.
//! The signed payload is `"{t}.{raw body}"`. Several `v1` entries appear while a
//! signing secret is being rolled; any one of them matching is enough.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Name of the header Stripe puts the signature in.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Default tolerance between the signed timestamp and the local clock.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

/// Reasons a signature is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("No stripe-signature header value was provided")]
    MissingHeader,

    #[error("Unable to parse stripe-signature header: {0}")]
    MalformedHeader(&'static str),

    #[error("Timestamp outside the tolerance zone (age {age_secs}s, tolerance {tolerance_secs}s)")]
    TimestampOutsideTolerance { age_secs: i64, tolerance_secs: u64 },

    #[error("No signatures found matching the expected signature for payload")]
    NoMatchingSignature,
}

/// Parsed `Stripe-Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, SignatureError> {
        let header = header.trim();
        if header.is_empty() {
            return Err(SignatureError::MissingHeader);
        }

        let mut timestamp = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or(SignatureError::MalformedHeader("expected key=value pairs"))?;

            match key {
                "t" => {
                    let t = value
                        .parse::<i64>()
                        .map_err(|_| SignatureError::MalformedHeader("invalid timestamp"))?;
                    timestamp = Some(t);
                }
                // Undecodable entries can never match; skip them like unknown schemes.
                "v1" => {
                    if let Ok(sig) = hex::decode(value) {
                        v1_signatures.push(sig);
                    }
                }
                // v0 and future schemes are ignored
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::MalformedHeader("missing timestamp"))?;
        if v1_signatures.is_empty() {
            return Err(SignatureError::MalformedHeader("no v1 signatures"));
        }

        Ok(SignatureHeader {
            timestamp,
            v1_signatures,
        })
    }
}

/// Verifies Stripe signatures against a single signing secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    tolerance: Duration,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>, tolerance: Duration) -> Self {
        Self {
            secret: secret.into(),
            tolerance,
        }
    }

    /// Verify `payload` against the header value using the current wall clock.
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<(), SignatureError> {
        self.verify_at(payload, header, unix_now())
    }

    /// Verify `payload` against the header value as of `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// - `MissingHeader` - header is empty
    /// - `MalformedHeader` - no timestamp or no usable `v1` entry
    /// - `TimestampOutsideTolerance` - timestamp too far from `now` in either direction
    /// - `NoMatchingSignature` - no `v1` entry matches the computed HMAC
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<(), SignatureError> {
        let header = SignatureHeader::parse(header).map_err(|e| {
            warn!(error = %e, "stripe_signature_header_invalid");
            e
        })?;

        // Timestamp is attacker-controlled; saturate instead of overflowing.
        let age = now.saturating_sub(header.timestamp);
        let tolerance_secs = self.tolerance.as_secs();
        if age.unsigned_abs() > tolerance_secs {
            warn!(
                webhook_time = header.timestamp,
                current_time = now,
                age_seconds = age,
                max_age_seconds = tolerance_secs,
                "stripe_signature_stale"
            );
            return Err(SignatureError::TimestampOutsideTolerance {
                age_secs: age,
                tolerance_secs,
            });
        }

        let mac = signed_payload_mac(&self.secret, header.timestamp, payload);

        // verify_slice compares in constant time
        let valid = header
            .v1_signatures
            .iter()
            .any(|sig| mac.clone().verify_slice(sig).is_ok());

        if !valid {
            warn!(
                candidates = header.v1_signatures.len(),
                payload_length = payload.len(),
                "stripe_signature_mismatch"
            );
            return Err(SignatureError::NoMatchingSignature);
        }

        Ok(())
    }
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`, as Stripe puts in `v1`.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    hex::encode(
        signed_payload_mac(secret, timestamp, payload)
            .finalize()
            .into_bytes(),
    )
}

/// Build a complete header value for `payload`. Used by tests and local tooling.
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    format!(
        "t={},v1={}",
        timestamp,
        compute_signature(secret, timestamp, payload)
    )
}

fn signed_payload_mac(secret: &str, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

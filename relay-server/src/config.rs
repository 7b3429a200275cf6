//! Configuration module for environment variable parsing.
//!
//! Everything is read once at startup. Required secrets fail fast so a
//! misconfigured deploy never starts accepting webhooks it cannot verify.

use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;
use url::Url;

/// Default sender address for activation emails.
pub const DEFAULT_EMAIL_FROM: &str = "info@nexuscopier.com";

/// Default SendGrid API base URL.
pub const DEFAULT_SENDGRID_API_BASE: &str = "https://api.sendgrid.com";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Stripe API secret key
    pub stripe_secret_key: String,

    /// Stripe webhook signing secret (`whsec_...`)
    pub stripe_webhook_secret: String,

    /// Maximum clock skew in seconds accepted on signature timestamps
    pub signature_tolerance_secs: u64,

    /// SendGrid API key
    pub sendgrid_api_key: String,

    /// SendGrid API base URL
    pub sendgrid_api_base: Url,

    /// Sender address on activation emails
    pub email_from: String,

    /// HTTP request timeout in milliseconds for outbound email calls
    pub request_timeout_ms: u64,

    /// Port for the web server to listen on
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let sendgrid_api_base = match env::var("SENDGRID_API_BASE") {
            Ok(raw) if !raw.trim().is_empty() => {
                Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
                    name: "SENDGRID_API_BASE",
                    reason: e.to_string(),
                })?
            }
            _ => Url::parse(DEFAULT_SENDGRID_API_BASE).map_err(|e| ConfigError::Invalid {
                name: "SENDGRID_API_BASE",
                reason: e.to_string(),
            })?,
        };

        Ok(Config {
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,

            stripe_webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,

            signature_tolerance_secs: parse_or("STRIPE_SIGNATURE_TOLERANCE_SECS", 300),

            sendgrid_api_key: required("SENDGRID_API_KEY")?,

            sendgrid_api_base,

            email_from: env::var("EMAIL_FROM")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string()),

            request_timeout_ms: parse_or("REQUEST_TIMEOUT_MS", 8000),

            port: parse_or("PORT", 4242),
        })
    }

    pub fn signature_tolerance(&self) -> Duration {
        Duration::from_secs(self.signature_tolerance_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// Secrets are reported by presence only.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("stripe_secret_key", &redact(&self.stripe_secret_key))
            .field("stripe_webhook_secret", &redact(&self.stripe_webhook_secret))
            .field("signature_tolerance_secs", &self.signature_tolerance_secs)
            .field("sendgrid_api_key", &redact(&self.sendgrid_api_key))
            .field("sendgrid_api_base", &self.sendgrid_api_base.as_str())
            .field("email_from", &self.email_from)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("port", &self.port)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

/// Read a variable that must be present and non-blank.
fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Parse an optional variable, falling back to `default` when absent or invalid.
fn parse_or<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid numeric value, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests below mutate process-wide environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ALL_VARS: &[&str] = &[
        "STRIPE_SECRET_KEY",
        "STRIPE_WEBHOOK_SECRET",
        "SENDGRID_API_KEY",
        "STRIPE_SIGNATURE_TOLERANCE_SECS",
        "SENDGRID_API_BASE",
        "EMAIL_FROM",
        "REQUEST_TIMEOUT_MS",
        "PORT",
    ];

    fn reset_env() {
        for name in ALL_VARS {
            env::remove_var(name);
        }
    }

    fn set_required() {
        env::set_var("STRIPE_SECRET_KEY", "sk_test_123");
        env::set_var("STRIPE_WEBHOOK_SECRET", "whsec_test");
        env::set_var("SENDGRID_API_KEY", "SG.test");
    }

    #[test]
    fn test_from_env_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        reset_env();
        set_required();

        let config = Config::from_env().unwrap();

        assert_eq!(config.port, 4242);
        assert_eq!(config.signature_tolerance_secs, 300);
        assert_eq!(config.request_timeout_ms, 8000);
        assert_eq!(config.email_from, DEFAULT_EMAIL_FROM);
        assert_eq!(config.sendgrid_api_base.as_str(), "https://api.sendgrid.com/");
        assert_eq!(config.stripe_webhook_secret, "whsec_test");
        reset_env();
    }

    #[test]
    fn test_from_env_missing_required() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        reset_env();
        env::set_var("STRIPE_SECRET_KEY", "sk_test_123");
        env::set_var("SENDGRID_API_KEY", "SG.test");

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::Missing("STRIPE_WEBHOOK_SECRET")));
        reset_env();
    }

    #[test]
    fn test_from_env_blank_required_is_missing() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        reset_env();
        set_required();
        env::set_var("SENDGRID_API_KEY", "   ");

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::Missing("SENDGRID_API_KEY")));
        reset_env();
    }

    #[test]
    fn test_from_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        reset_env();
        set_required();
        env::set_var("PORT", "8080");
        env::set_var("STRIPE_SIGNATURE_TOLERANCE_SECS", "60");
        env::set_var("EMAIL_FROM", "licenses@example.com");
        env::set_var("SENDGRID_API_BASE", "http://127.0.0.1:9000");

        let config = Config::from_env().unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.signature_tolerance(), Duration::from_secs(60));
        assert_eq!(config.email_from, "licenses@example.com");
        assert_eq!(config.sendgrid_api_base.as_str(), "http://127.0.0.1:9000/");
        reset_env();
    }

    #[test]
    fn test_from_env_invalid_port_uses_default() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        reset_env();
        set_required();
        env::set_var("PORT", "not-a-port");

        let config = Config::from_env().unwrap();

        assert_eq!(config.port, 4242);
        reset_env();
    }

    #[test]
    fn test_from_env_invalid_api_base() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        reset_env();
        set_required();
        env::set_var("SENDGRID_API_BASE", "not a url");

        let err = Config::from_env().unwrap_err();

        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "SENDGRID_API_BASE",
                ..
            }
        ));
        reset_env();
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config {
            stripe_secret_key: "sk_live_secret".to_string(),
            stripe_webhook_secret: "whsec_secret".to_string(),
            signature_tolerance_secs: 300,
            sendgrid_api_key: "SG.secret".to_string(),
            sendgrid_api_base: Url::parse(DEFAULT_SENDGRID_API_BASE).unwrap(),
            email_from: DEFAULT_EMAIL_FROM.to_string(),
            request_timeout_ms: 8000,
            port: 4242,
        };

        let rendered = format!("{:?}", config);

        assert!(!rendered.contains("sk_live_secret"));
        assert!(!rendered.contains("whsec_secret"));
        assert!(!rendered.contains("SG.secret"));
        assert!(rendered.contains("<redacted>"));
    }
}

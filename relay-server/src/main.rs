//! Nexus Relay web server.
//!
//! Receives Stripe webhooks and sends the Nexus activation email for every
//! completed checkout that carries a customer address.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use relay::{router, AppState, Config, SendGridClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("relay_starting");

    // Load configuration; missing secrets stop the process here
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        port = config.port,
        stripe_secret_key_set = !config.stripe_secret_key.is_empty(),
        signature_tolerance_secs = config.signature_tolerance_secs,
        sendgrid_api_base = %config.sendgrid_api_base,
        email_from = %config.email_from,
        request_timeout_ms = config.request_timeout_ms,
        "config_loaded"
    );

    let notifier = SendGridClient::from_config(&config)?;
    info!(endpoint = %notifier.endpoint(), "sendgrid_client_created");

    let port = config.port;
    let state = AppState::new(config, Arc::new(notifier));
    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "relay_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("relay_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("relay_shutting_down");
}

//! SMS Registration Service
//!
//! Entry point for the HTTP service that sends SMS verification codes, checks
//! username availability and registers accounts with an identity provider.
//!
//! # Flow
//! 1. Client requests a code for a phone number (`/api/send-sms`)
//! 2. Service issues a code and delivers it over SMS
//! 3. Client submits the code (`/api/verify-sms`)
//! 4. Client checks a username and registers (`/api/check-username`, `/api/register`)

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sms_registration::api::{self, ApiSettings, AppState};
use sms_registration::config::{Config, LoggingConfig};
use sms_registration::identity;
use sms_registration::sms;
use sms_registration::verification::{VerificationConfig, VerificationService};

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over the configured level.
fn setup_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("invalid log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false);

    let result = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!(e))
}

/// Builds the collaborators and serves HTTP until Ctrl-C.
async fn run(config: Config) -> anyhow::Result<()> {
    info!(provider = ?config.sms.provider, "Initializing SMS sender...");
    let sms_sender = sms::from_config(&config.sms).await?;

    info!(provider = ?config.identity.provider, "Initializing identity provider...");
    let identity_provider = identity::from_config(&config.identity).await?;

    let verification = Arc::new(VerificationService::new(VerificationConfig::from(
        &config.verification,
    )));
    info!(
        code_length = config.verification.code_length,
        ttl_secs = config.verification.ttl_secs,
        "Verification service ready"
    );

    let sweeper = match config.verification.sweep_interval_secs {
        0 => None,
        secs => Some(verification.spawn_sweeper(Duration::from_secs(secs))),
    };

    let app = api::router(AppState {
        verification,
        sms: sms_sender,
        identity: identity_provider,
        settings: Arc::new(ApiSettings::from(&config.verification)),
    });

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Starting server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::new().context("failed to load configuration")?;
    setup_logging(&config.logging)?;
    info!("{} starting up...", config.application.name);

    run(config).await
}

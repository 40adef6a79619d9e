//! # encore-server
//!
//! Song request service for a live DJ set.
//!
//! This binary provides:
//! - **Public API** for submitting tipped song requests, viewing the queue,
//!   and managing a requester's own history and saved songs
//! - **Admin API** (bearer token) for moving requests through
//!   `pending -> playing -> completed`, editing the request schedule, and
//!   revenue analytics
//! - **Checkout** through Stripe when a secret key is configured

mod api;
mod config;
mod error;
mod lifecycle;
mod payment;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use encore_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::lifecycle::{LifecycleManager, SystemClock};
use crate::payment::{CheckoutService, StripeClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,encore_server=debug,encore_store=debug")),
        )
        .init();

    info!("Starting Encore request server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    info!(
        min_tip = ?config.min_tip.map(|t| t.to_string()),
        schedule_enforced = config.schedule_enforced,
        admin_enabled = config.admin_token.is_some(),
        payments_enabled = config.stripe_secret_key.is_some(),
        "Request policy"
    );

    // -----------------------------------------------------------------------
    // 3. Open the database (runs migrations)
    // -----------------------------------------------------------------------
    let db = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    info!(path = ?db.path(), "Database ready");
    let db = Arc::new(Mutex::new(db));

    // -----------------------------------------------------------------------
    // 4. Wire services
    // -----------------------------------------------------------------------
    let lifecycle = LifecycleManager::new(db, config.submission_policy(), Arc::new(SystemClock));

    let checkout = match &config.stripe_secret_key {
        Some(key) => {
            let stripe = StripeClient::new(config.stripe_api_base.clone(), key.clone())?;
            Some(CheckoutService::new(
                Arc::new(stripe),
                lifecycle.clone(),
                config.payment_currency.clone(),
                config.public_base_url.clone(),
            ))
        }
        None => {
            warn!("STRIPE_SECRET_KEY not set, payment endpoints disabled");
            None
        }
    };

    let http_addr = config.http_addr;
    let app_state = AppState {
        lifecycle,
        checkout,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

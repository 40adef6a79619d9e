//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::FixedOffset;
use encore_shared::schedule::offset_from_minutes;
use encore_shared::Tip;

use crate::lifecycle::SubmissionPolicy;
use crate::payment::normalize_currency;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: platform data directory (`encore.db`).
    pub database_path: Option<PathBuf>,

    /// Admin API bearer token. Required to access /admin/* endpoints.
    /// Env: `ADMIN_TOKEN`
    /// Default: empty (admin API disabled).
    pub admin_token: Option<String>,

    /// Smallest accepted tip. `MIN_TIP=0` disables the check.
    /// Env: `MIN_TIP` (decimal currency units)
    /// Default: `2.00`
    pub min_tip: Option<Tip>,

    /// Whether submissions are limited to the configured schedule windows.
    /// Env: `SCHEDULE_ENFORCED` (true/false)
    /// Default: `true`
    pub schedule_enforced: bool,

    /// Local time zone of the venue, as an offset from UTC.
    /// Env: `SCHEDULE_UTC_OFFSET_MINUTES`
    /// Default: `0`
    pub utc_offset: FixedOffset,

    /// First sentence of the message shown when requests are closed.
    /// Env: `SCHEDULE_CLOSED_MESSAGE`
    pub schedule_closed_message: String,

    /// Currency for checkout sessions.
    /// Env: `PAYMENT_CURRENCY`
    /// Default: `usd`
    pub payment_currency: String,

    /// Stripe secret key. Payments are disabled when unset.
    /// Env: `STRIPE_SECRET_KEY`
    pub stripe_secret_key: Option<String>,

    /// Env: `STRIPE_API_BASE`
    /// Default: `https://api.stripe.com`
    pub stripe_api_base: String,

    /// Where checkout redirects the requester afterwards.
    /// Env: `PUBLIC_BASE_URL`
    /// Default: `http://localhost:8080`
    pub public_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let policy = SubmissionPolicy::default();
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            database_path: None,
            admin_token: None,
            min_tip: policy.minimum_tip,
            schedule_enforced: policy.schedule_enforced,
            utc_offset: policy.utc_offset,
            schedule_closed_message: policy.closed_message,
            payment_currency: "usd".to_string(),
            stripe_secret_key: None,
            stripe_api_base: "https://api.stripe.com".to_string(),
            public_base_url: "http://localhost:8080".to_string(),
        }
    }
}

// Secrets stay out of the startup log.
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "<redacted>"))
            .field("min_tip", &self.min_tip.map(|t| t.to_string()))
            .field("schedule_enforced", &self.schedule_enforced)
            .field("utc_offset", &self.utc_offset)
            .field("schedule_closed_message", &self.schedule_closed_message)
            .field("payment_currency", &self.payment_currency)
            .field(
                "stripe_secret_key",
                &self.stripe_secret_key.as_ref().map(|_| "<redacted>"),
            )
            .field("stripe_api_base", &self.stripe_api_base)
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(addr) = non_empty("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = non_empty("DATABASE_PATH") {
            config.database_path = Some(PathBuf::from(path));
        }

        config.admin_token = non_empty("ADMIN_TOKEN");

        if let Some(val) = non_empty("MIN_TIP") {
            match parse_min_tip(&val) {
                Ok(min) => config.min_tip = min,
                Err(e) => tracing::warn!(value = %val, error = %e, "Invalid MIN_TIP, using default"),
            }
        }

        if let Some(val) = non_empty("SCHEDULE_ENFORCED") {
            config.schedule_enforced = parse_flag(&val);
        }

        if let Some(val) = non_empty("SCHEDULE_UTC_OFFSET_MINUTES") {
            match val.trim().parse::<i32>().ok().and_then(offset_from_minutes) {
                Some(offset) => config.utc_offset = offset,
                None => tracing::warn!(
                    value = %val,
                    "Invalid SCHEDULE_UTC_OFFSET_MINUTES, using UTC"
                ),
            }
        }

        if let Some(message) = non_empty("SCHEDULE_CLOSED_MESSAGE") {
            config.schedule_closed_message = message;
        }

        if let Some(currency) = non_empty("PAYMENT_CURRENCY") {
            match normalize_currency(&currency) {
                Ok(code) => config.payment_currency = code,
                Err(e) => tracing::warn!(
                    value = %currency,
                    error = %e,
                    "Invalid PAYMENT_CURRENCY, using default"
                ),
            }
        }

        config.stripe_secret_key = non_empty("STRIPE_SECRET_KEY");

        if let Some(base) = non_empty("STRIPE_API_BASE") {
            config.stripe_api_base = base.trim_end_matches('/').to_string();
        }

        if let Some(base) = non_empty("PUBLIC_BASE_URL") {
            config.public_base_url = base.trim_end_matches('/').to_string();
        }

        config
    }

    pub fn submission_policy(&self) -> SubmissionPolicy {
        SubmissionPolicy {
            minimum_tip: self.min_tip,
            schedule_enforced: self.schedule_enforced,
            utc_offset: self.utc_offset,
            closed_message: self.schedule_closed_message.clone(),
        }
    }
}

/// Parse a decimal minimum tip. Zero turns the minimum off.
fn parse_min_tip(raw: &str) -> Result<Option<Tip>, String> {
    let tip: Tip = raw.trim().parse().map_err(|e| format!("{e}"))?;
    Ok((!tip.is_zero()).then_some(tip))
}

fn parse_flag(val: &str) -> bool {
    !matches!(val.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no" | "off")
}

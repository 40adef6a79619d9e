//! Paid requests through a hosted checkout provider.
//!
//! The provider is behind [`PaymentProvider`] so the HTTP layer and tests do
//! not depend on Stripe being reachable. Payment state never gates the play
//! lifecycle; it is recorded next to the request for the DJ's benefit.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use encore_shared::{PaymentStatus, RequestId, Tip};
use encore_store::{Payment, PaymentState, StoreError};

use crate::lifecycle::LifecycleManager;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Song request not found: {0}")]
    RequestNotFound(RequestId),

    #[error("Unknown checkout session: {0}")]
    UnknownSession(String),

    #[error("Nothing to pay: the request carries no tip")]
    NothingToPay,

    #[error("Invalid currency: {0}")]
    InvalidCurrency(String),

    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        Self::Provider(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Provider seam
// ---------------------------------------------------------------------------

/// What we ask the provider to charge.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub request_id: RequestId,
    pub amount: Tip,
    pub currency: String,
    pub product_name: String,
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderPaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Complete,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionState {
    pub id: String,
    pub payment_status: ProviderPaymentStatus,
    pub status: SessionStatus,
    #[serde(default)]
    pub payment_intent: Option<String>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout(&self, checkout: &CheckoutRequest) -> Result<CheckoutSession, PaymentError>;

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionState, PaymentError>;
}

// ---------------------------------------------------------------------------
// Stripe
// ---------------------------------------------------------------------------

/// Minimal Stripe Checkout client (form-encoded REST).
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: String,
}

impl StripeClient {
    pub fn new(api_base: impl Into<String>, secret_key: impl Into<String>) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.into(),
            secret_key: secret_key.into(),
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, PaymentError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<T>().await?);
        }
        let message = match resp.json::<StripeErrorBody>().await {
            Ok(body) => body.error.message,
            Err(_) => format!("HTTP {status}"),
        };
        Err(PaymentError::Provider(message))
    }
}

fn checkout_form(checkout: &CheckoutRequest) -> Vec<(&'static str, String)> {
    vec![
        ("mode", "payment".to_string()),
        ("line_items[0][quantity]", "1".to_string()),
        ("line_items[0][price_data][currency]", checkout.currency.clone()),
        (
            "line_items[0][price_data][unit_amount]",
            checkout.amount.cents().to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]",
            checkout.product_name.clone(),
        ),
        (
            "line_items[0][price_data][product_data][description]",
            checkout.description.clone(),
        ),
        ("metadata[song_request_id]", checkout.request_id.to_string()),
        ("success_url", checkout.success_url.clone()),
        ("cancel_url", checkout.cancel_url.clone()),
    ]
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout(&self, checkout: &CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        let resp = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&checkout_form(checkout))
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionState, PaymentError> {
        let resp = self
            .http
            .get(format!("{}/v1/checkout/sessions/{}", self.api_base, session_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        Self::decode(resp).await
    }
}

// ---------------------------------------------------------------------------
// Checkout service
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutCreated {
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyOutcome {
    pub session_id: String,
    pub payment_status: ProviderPaymentStatus,
    pub state: PaymentState,
    pub song_request_id: Option<RequestId>,
}

/// Opens checkout sessions for song requests and folds the provider's answer
/// back into the local records.
#[derive(Clone)]
pub struct CheckoutService {
    provider: Arc<dyn PaymentProvider>,
    lifecycle: LifecycleManager,
    currency: String,
    public_base_url: String,
}

impl CheckoutService {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        lifecycle: LifecycleManager,
        currency: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            lifecycle,
            currency: currency.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub async fn create_payment(
        &self,
        request_id: RequestId,
        currency: Option<&str>,
    ) -> Result<CheckoutCreated, PaymentError> {
        let currency = match currency {
            Some(c) => normalize_currency(c)?,
            None => self.currency.clone(),
        };

        let db = self.lifecycle.database();
        let request = db
            .lock()
            .await
            .get_song_request(request_id)
            .map_err(|e| match e {
                StoreError::NotFound => PaymentError::RequestNotFound(request_id),
                other => PaymentError::Store(other),
            })?;
        if request.tip_amount.is_zero() {
            return Err(PaymentError::NothingToPay);
        }

        let checkout = CheckoutRequest {
            request_id,
            amount: request.tip_amount,
            currency: currency.clone(),
            product_name: format!("Tip for: {} - {}", request.song_name, request.artist_name),
            description: format!("Tip of {} for the DJ", request.tip_amount),
            success_url: format!(
                "{}/?payment=success&session_id={{CHECKOUT_SESSION_ID}}",
                self.public_base_url
            ),
            cancel_url: format!("{}/?payment=cancelled", self.public_base_url),
        };

        // No lock is held across the provider call.
        let session = self.provider.create_checkout(&checkout).await?;

        let now = self.lifecycle.now();
        let mut payment = Payment {
            id: Uuid::new_v4(),
            song_request_id: Some(request_id),
            session_id: session.id.clone(),
            amount: request.tip_amount,
            currency,
            status: PaymentState::Pending,
            payment_intent_id: None,
            created_at: now,
            updated_at: now,
        };
        {
            let db = db.lock().await;
            match db.get_song_request(request_id) {
                Ok(_) => {}
                Err(StoreError::NotFound) => {
                    // Deleted while the session was being created. Keep the
                    // session on record so it can still be reconciled.
                    payment.song_request_id = None;
                    db.insert_payment(&payment)?;
                    warn!(id = %request_id, session = %session.id, "request deleted during checkout");
                    return Err(PaymentError::RequestNotFound(request_id));
                }
                Err(e) => return Err(e.into()),
            }
            db.insert_payment(&payment)?;
            db.bind_payment_session(request_id, &session.id, now)?;
        }

        info!(id = %request_id, session = %session.id, amount = %payment.amount, "checkout created");
        Ok(CheckoutCreated {
            session_id: session.id,
            url: session.url,
        })
    }

    pub async fn verify_payment(&self, session_id: &str) -> Result<VerifyOutcome, PaymentError> {
        let db = self.lifecycle.database();
        let known = db.lock().await.get_payment_by_session(session_id);
        match known {
            Ok(_) => {}
            Err(StoreError::NotFound) => return Err(PaymentError::UnknownSession(session_id.to_string())),
            Err(e) => return Err(e.into()),
        }

        let session = self.provider.retrieve_session(session_id).await?;

        let (state, request_status) = match (session.payment_status, session.status) {
            (ProviderPaymentStatus::Paid | ProviderPaymentStatus::NoPaymentRequired, _) => {
                (PaymentState::Completed, PaymentStatus::Paid)
            }
            (ProviderPaymentStatus::Unpaid, SessionStatus::Open) => {
                (PaymentState::Pending, PaymentStatus::Pending)
            }
            // Closed without payment.
            (ProviderPaymentStatus::Unpaid, _) => (PaymentState::Failed, PaymentStatus::Failed),
        };

        let now = self.lifecycle.now();
        let payment = {
            let db = db.lock().await;
            let payment = db.update_payment_status(
                session_id,
                state,
                session.payment_intent.as_deref(),
                now,
            )?;
            match payment.song_request_id {
                Some(id) => {
                    if !db.set_payment_status(id, request_status, now)? {
                        debug!(id = %id, session = %session_id, "request payment status unchanged");
                    }
                }
                None => info!(session = %session_id, "payment outlived its request"),
            }
            payment
        };

        info!(session = %session_id, state = %state, "payment verified");
        Ok(VerifyOutcome {
            session_id: session_id.to_string(),
            payment_status: session.payment_status,
            state: payment.status,
            song_request_id: payment.song_request_id,
        })
    }
}

/// ISO 4217 codes, lowercased.
pub(crate) fn normalize_currency(raw: &str) -> Result<String, PaymentError> {
    let code = raw.trim().to_ascii_lowercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_lowercase()) {
        Ok(code)
    } else {
        Err(PaymentError::InvalidCurrency(raw.to_string()))
    }
}

//! Records that only exist at the persistence layer.
//!
//! Song requests, saved songs and schedule windows live in `encore-shared`
//! and are re-exported here for convenience.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use encore_shared::{ParseStatusError, RequestId, Tip};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use encore_shared::{SavedSong, ScheduleWindow, SongRequest};

// ---------------------------------------------------------------------------
// Payment
// ---------------------------------------------------------------------------

/// Outcome of a checkout session as recorded locally.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    Pending,
    Completed,
    Failed,
}

impl PaymentState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentState {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(ParseStatusError {
                kind: "payment record",
                value: other.to_string(),
            }),
        }
    }
}

/// One checkout session opened for a song request's tip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    /// Cleared if the request is deleted; the payment row is kept for accounting.
    pub song_request_id: Option<RequestId>,
    pub session_id: String,
    pub amount: Tip,
    pub currency: String,
    pub status: PaymentState,
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

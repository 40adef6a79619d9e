//! Domain records shared by the store and the HTTP layer.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the presentation layer as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{IllegalTransition, ValidationError};
use crate::lifecycle::PlayAction;
use crate::types::{PaymentStatus, PlayedStatus, RequestId, Tip, UserId};

// ---------------------------------------------------------------------------
// SongRequest
// ---------------------------------------------------------------------------

/// One user-submitted request to play a song.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SongRequest {
    pub id: RequestId,
    pub song_name: String,
    pub artist_name: String,
    pub genre: Option<String>,
    pub requester_name: Option<String>,
    /// Messaging handle the DJ can use to reach the requester.
    pub contact_handle: Option<String>,
    pub tip_amount: Tip,
    pub payment_status: PaymentStatus,
    pub played_status: PlayedStatus,
    pub created_at: DateTime<Utc>,
    /// Set once, on the transition into `playing`.
    pub played_at: Option<DateTime<Utc>>,
    pub owner_user_id: Option<UserId>,
    /// Checkout session bound to this request by the payment flow.
    pub payment_session_id: Option<String>,
    pub payment_verified_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl SongRequest {
    /// Build a fresh `pending`/`pending` record from a validated submission.
    pub fn from_submission(new: NewSongRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: RequestId::new(),
            song_name: new.song_name,
            artist_name: new.artist_name,
            genre: new.genre,
            requester_name: new.requester_name,
            contact_handle: new.contact_handle,
            tip_amount: new.tip_amount,
            payment_status: PaymentStatus::Pending,
            played_status: PlayedStatus::Pending,
            created_at: now,
            played_at: None,
            owner_user_id: new.owner_user_id,
            payment_session_id: None,
            payment_verified_at: None,
            updated_at: now,
        }
    }

    /// Apply a lifecycle action in memory.
    ///
    /// On failure the record is left untouched, so `played_at` never moves
    /// once it has been set.
    pub fn apply(&mut self, action: PlayAction, now: DateTime<Utc>) -> Result<(), IllegalTransition> {
        let next = action.apply_to(self.played_status)?;
        if next == PlayedStatus::Playing && self.played_at.is_none() {
            self.played_at = Some(now);
        }
        self.played_status = next;
        self.updated_at = now;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// NewSongRequest
// ---------------------------------------------------------------------------

/// Submission payload, before it becomes a [`SongRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewSongRequest {
    pub song_name: String,
    pub artist_name: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub requester_name: Option<String>,
    #[serde(default)]
    pub contact_handle: Option<String>,
    pub tip_amount: Tip,
    #[serde(default)]
    pub owner_user_id: Option<UserId>,
}

impl NewSongRequest {
    pub fn new(song_name: impl Into<String>, artist_name: impl Into<String>, tip_amount: Tip) -> Self {
        Self {
            song_name: song_name.into(),
            artist_name: artist_name.into(),
            genre: None,
            requester_name: None,
            contact_handle: None,
            tip_amount,
            owner_user_id: None,
        }
    }

    /// Trim text fields, drop blank optionals and enforce the submission rules.
    ///
    /// `minimum_tip` of `None` means no minimum is enforced. The tip was
    /// already rounded to whole cents when it was parsed, so the minimum is
    /// compared against the rounded amount (1.996 counts as 2.00).
    pub fn validate(self, minimum_tip: Option<Tip>) -> Result<Self, ValidationError> {
        let song_name = self.song_name.trim().to_string();
        if song_name.is_empty() {
            return Err(ValidationError::EmptyField("song_name"));
        }
        let artist_name = self.artist_name.trim().to_string();
        if artist_name.is_empty() {
            return Err(ValidationError::EmptyField("artist_name"));
        }
        if let Some(minimum) = minimum_tip {
            if self.tip_amount < minimum {
                return Err(ValidationError::TipBelowMinimum {
                    tip: self.tip_amount,
                    minimum,
                });
            }
        }

        Ok(Self {
            song_name,
            artist_name,
            genre: non_blank(self.genre),
            requester_name: non_blank(self.requester_name),
            contact_handle: non_blank(self.contact_handle),
            tip_amount: self.tip_amount,
            owner_user_id: self.owner_user_id,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// SavedSong
// ---------------------------------------------------------------------------

/// A bookmark of a past request, kept so the user can request it again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedSong {
    pub id: Uuid,
    pub song_name: String,
    pub artist_name: String,
    pub genre: Option<String>,
    /// The tip used the last time this song was requested.
    pub tip_amount: Tip,
    pub owner_user_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl SavedSong {
    pub fn from_request(request: &SongRequest, owner: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            song_name: request.song_name.clone(),
            artist_name: request.artist_name.clone(),
            genre: request.genre.clone(),
            tip_amount: request.tip_amount,
            owner_user_id: owner,
            created_at: now,
        }
    }
}

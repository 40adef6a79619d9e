//! The play-status state machine.
//!
//! ```text
//! pending --Play--> playing --Complete--> completed
//! ```
//!
//! Deletion is not a transition: it removes the record from any state and is
//! handled by the store.

use serde::{Deserialize, Serialize};

use crate::error::IllegalTransition;
use crate::types::PlayedStatus;

/// An admin action that moves a request forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlayAction {
    Play,
    Complete,
}

impl PlayAction {
    /// The only state this action may be applied to.
    pub fn required_status(self) -> PlayedStatus {
        match self {
            Self::Play => PlayedStatus::Pending,
            Self::Complete => PlayedStatus::Playing,
        }
    }

    pub fn target_status(self) -> PlayedStatus {
        match self {
            Self::Play => PlayedStatus::Playing,
            Self::Complete => PlayedStatus::Completed,
        }
    }

    pub fn apply_to(self, current: PlayedStatus) -> Result<PlayedStatus, IllegalTransition> {
        if current == self.required_status() {
            Ok(self.target_status())
        } else {
            Err(IllegalTransition {
                from: current,
                to: self.target_status(),
            })
        }
    }
}

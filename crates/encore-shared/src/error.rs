use thiserror::Error;

use crate::types::{PlayedStatus, Tip};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TipError {
    #[error("Tip amount must be a finite number")]
    NotFinite,

    #[error("Tip amount cannot be negative")]
    Negative,

    #[error("Tip amount exceeds the maximum of {max}")]
    TooLarge { max: Tip },

    #[error("Invalid tip amount: {0}")]
    Malformed(String),
}

/// Submission or administration input that fails a business rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    EmptyField(&'static str),

    #[error("Tip of {tip} is below the minimum of {minimum}")]
    TipBelowMinimum { tip: Tip, minimum: Tip },

    #[error("Invalid tip: {0}")]
    Tip(#[from] TipError),

    #[error("Day of week must be between 0 (Sunday) and 6 (Saturday), got {0}")]
    InvalidDayOfWeek(u8),

    #[error("Invalid time of day: {0} (expected HH:MM)")]
    InvalidTime(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot move a request from {from} to {to}")]
pub struct IllegalTransition {
    pub from: PlayedStatus,
    pub to: PlayedStatus,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind} status: {value}")]
pub struct ParseStatusError {
    pub kind: &'static str,
    pub value: String,
}

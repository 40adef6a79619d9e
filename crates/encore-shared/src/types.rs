use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{ParseStatusError, TipError};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque reference to an authenticated requester, issued by the upstream
/// auth layer. Requests keep it as a weak reference only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Tip
// ---------------------------------------------------------------------------

/// A non-negative currency amount held as whole cents.
///
/// Over JSON a tip travels as a decimal number (`5.0`, `2.5`); inputs with
/// more precision are rounded to the nearest cent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tip(u64);

impl Tip {
    pub const ZERO: Tip = Tip(0);

    /// Upper bound accepted from user input (100,000.00).
    pub const MAX: Tip = Tip(10_000_000);

    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub fn from_decimal(amount: f64) -> Result<Self, TipError> {
        if !amount.is_finite() {
            return Err(TipError::NotFinite);
        }
        if amount < 0.0 {
            return Err(TipError::Negative);
        }
        let cents = (amount * 100.0).round();
        if cents > Self::MAX.0 as f64 {
            return Err(TipError::TooLarge { max: Self::MAX });
        }
        Ok(Self(cents as u64))
    }

    pub fn cents(self) -> u64 {
        self.0
    }

    pub fn as_decimal(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn saturating_add(self, other: Tip) -> Tip {
        Tip(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Tip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Tip {
    type Err = TipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| TipError::Malformed(s.to_string()))?;
        Self::from_decimal(value)
    }
}

impl Serialize for Tip {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_decimal())
    }
}

impl<'de> Deserialize<'de> for Tip {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Tip::from_decimal(value).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

/// Play lifecycle of a request: `pending -> playing -> completed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlayedStatus {
    Pending,
    Playing,
    Completed,
}

impl PlayedStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Playing => "playing",
            Self::Completed => "completed",
        }
    }

    /// Whether a request in this state belongs to the active queue.
    pub fn is_queued(self) -> bool {
        matches!(self, Self::Pending | Self::Playing)
    }
}

impl fmt::Display for PlayedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlayedStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "playing" => Ok(Self::Playing),
            "completed" => Ok(Self::Completed),
            other => Err(ParseStatusError {
                kind: "played",
                value: other.to_string(),
            }),
        }
    }
}

/// Payment axis of a request. Moves independently of [`PlayedStatus`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Verified,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Verified => "verified",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "verified" => Ok(Self::Verified),
            "failed" => Ok(Self::Failed),
            other => Err(ParseStatusError {
                kind: "payment",
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tip_rounds_to_nearest_cent() {
        assert_eq!(Tip::from_decimal(2.0).unwrap().cents(), 200);
        assert_eq!(Tip::from_decimal(1.999).unwrap().cents(), 200);
        assert_eq!(Tip::from_decimal(1.99).unwrap().cents(), 199);
        assert_eq!(Tip::from_decimal(0.0).unwrap(), Tip::ZERO);
    }

    #[test]
    fn tip_rejects_bad_input() {
        assert_eq!(Tip::from_decimal(-0.01), Err(TipError::Negative));
        assert_eq!(Tip::from_decimal(f64::NAN), Err(TipError::NotFinite));
        assert!(matches!(
            Tip::from_decimal(1e9),
            Err(TipError::TooLarge { .. })
        ));
        assert!(matches!("abc".parse::<Tip>(), Err(TipError::Malformed(_))));
    }

    #[test]
    fn tip_display_and_parse() {
        let tip: Tip = " 12.5 ".parse().unwrap();
        assert_eq!(tip.to_string(), "12.50");
        assert_eq!(Tip::from_cents(5).to_string(), "0.05");
    }

    #[test]
    fn tip_json_is_decimal() {
        let tip = Tip::from_cents(1050);
        assert_eq!(serde_json::to_string(&tip).unwrap(), "10.5");
        let back: Tip = serde_json::from_str("10.5").unwrap();
        assert_eq!(back, tip);
        assert!(serde_json::from_str::<Tip>("-1").is_err());
    }

    #[test]
    fn status_strings() {
        for status in [
            PlayedStatus::Pending,
            PlayedStatus::Playing,
            PlayedStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<PlayedStatus>().unwrap(), status);
        }
        assert!("deleted".parse::<PlayedStatus>().is_err());
        assert_eq!("paid".parse::<PaymentStatus>().unwrap(), PaymentStatus::Paid);
        assert_eq!(
            serde_json::to_string(&PlayedStatus::Playing).unwrap(),
            "\"playing\""
        );
    }

    #[test]
    fn queued_states() {
        assert!(PlayedStatus::Pending.is_queued());
        assert!(PlayedStatus::Playing.is_queued());
        assert!(!PlayedStatus::Completed.is_queued());
    }
}

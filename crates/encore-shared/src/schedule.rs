//! Request-window gating.
//!
//! Requests are accepted only while "now", converted to the venue's local
//! time, falls inside an active [`ScheduleWindow`]. A window whose end is not
//! after its start runs past midnight into the following day.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// One administrator-configured range of the week during which requests open.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub id: Uuid,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: u8,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ScheduleWindow {
    pub fn new(
        day_of_week: u8,
        start_time: NaiveTime,
        end_time: NaiveTime,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if day_of_week > 6 {
            return Err(ValidationError::InvalidDayOfWeek(day_of_week));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            day_of_week,
            start_time,
            end_time,
            is_active,
            created_at: now,
        })
    }

    pub fn wraps_midnight(&self) -> bool {
        self.end_time <= self.start_time
    }

    /// Whether `local` (venue wall-clock time) falls inside this window.
    /// Inactive windows contain nothing.
    pub fn contains(&self, local: NaiveDateTime) -> bool {
        if !self.is_active {
            return false;
        }
        let day = local.weekday().num_days_from_sunday() as u8;
        let time = local.time();

        if self.wraps_midnight() {
            let next_day = (self.day_of_week + 1) % 7;
            (day == self.day_of_week && time >= self.start_time)
                || (day == next_day && time < self.end_time)
        } else {
            day == self.day_of_week && time >= self.start_time && time < self.end_time
        }
    }

    pub fn label(&self) -> String {
        format!(
            "{} {}-{}",
            DAY_NAMES[usize::from(self.day_of_week % 7)],
            self.start_time.format("%H:%M"),
            self.end_time.format("%H:%M"),
        )
    }
}

/// Answer to "can a request be submitted right now?".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleStatus {
    pub is_allowed: bool,
    pub message: String,
}

/// The configured windows together with the venue timezone.
#[derive(Debug, Clone)]
pub struct Schedule {
    windows: Vec<ScheduleWindow>,
    utc_offset: FixedOffset,
    closed_message: String,
}

impl Schedule {
    pub fn new(
        windows: Vec<ScheduleWindow>,
        utc_offset: FixedOffset,
        closed_message: impl Into<String>,
    ) -> Self {
        Self {
            windows,
            utc_offset,
            closed_message: closed_message.into(),
        }
    }

    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&self.utc_offset).naive_local()
    }

    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        let local = self.local_time(now);
        self.windows.iter().any(|w| w.contains(local))
    }

    /// Closed message followed by the active opening hours.
    pub fn closed_message(&self) -> String {
        let hours: Vec<String> = self
            .windows
            .iter()
            .filter(|w| w.is_active)
            .map(ScheduleWindow::label)
            .collect();

        if hours.is_empty() {
            format!("{} No request hours are scheduled.", self.closed_message)
        } else {
            format!("{} Open hours: {}.", self.closed_message, hours.join(", "))
        }
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> ScheduleStatus {
        if self.is_open_at(now) {
            ScheduleStatus {
                is_allowed: true,
                message: "Requests are open.".to_string(),
            }
        } else {
            ScheduleStatus {
                is_allowed: false,
                message: self.closed_message(),
            }
        }
    }
}

/// Parse a wall-clock time given as `HH:MM` (seconds optional).
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime, ValidationError> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| ValidationError::InvalidTime(s.to_string()))
}

/// Build a timezone from a whole-minute UTC offset.
pub fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(minutes.checked_mul(60)?)
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time_of_day(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn time(s: &str) -> NaiveTime {
        parse_time_of_day(s).unwrap()
    }

    fn window(day: u8, start: &str, end: &str) -> ScheduleWindow {
        ScheduleWindow::new(day, time(start), time(end), true, Utc::now()).unwrap()
    }

    // 2024-03-01 was a Friday.
    fn friday_at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn same_day_window() {
        let w = window(5, "18:00", "23:00");
        assert!(!w.contains(friday_at(17, 59)));
        assert!(w.contains(friday_at(18, 0)));
        assert!(w.contains(friday_at(22, 59)));
        assert!(!w.contains(friday_at(23, 0)));
        // Same time on Saturday is outside.
        assert!(!w.contains(friday_at(20, 0) + chrono::Duration::days(1)));
    }

    #[test]
    fn window_past_midnight() {
        let w = window(5, "22:00", "02:00");
        assert!(w.wraps_midnight());
        assert!(w.contains(friday_at(23, 30)));
        let saturday_early = friday_at(1, 30) + chrono::Duration::days(1);
        assert!(w.contains(saturday_early));
        assert!(!w.contains(friday_at(1, 30)));
        assert!(!w.contains(friday_at(21, 59)));
    }

    #[test]
    fn saturday_window_wraps_into_sunday() {
        let w = window(6, "23:00", "01:00");
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 3)
            .unwrap()
            .and_hms_opt(0, 30, 0)
            .unwrap();
        assert!(w.contains(sunday));
    }

    #[test]
    fn inactive_window_never_matches() {
        let mut w = window(5, "00:00", "23:59");
        w.is_active = false;
        assert!(!w.contains(friday_at(12, 0)));
    }

    #[test]
    fn invalid_day_rejected() {
        let err = ScheduleWindow::new(7, time("10:00"), time("11:00"), true, Utc::now());
        assert_eq!(err, Err(ValidationError::InvalidDayOfWeek(7)));
        assert!(parse_time_of_day("25:00").is_err());
        assert_eq!(time("09:15:30").format("%H:%M").to_string(), "09:15");
    }

    #[test]
    fn status_uses_local_offset() {
        // Venue at UTC-5: Friday 20:00 local is Saturday 01:00 UTC.
        let offset = offset_from_minutes(-300).unwrap();
        let schedule = Schedule::new(vec![window(5, "19:00", "21:00")], offset, "Closed.");
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 1, 0, 0).unwrap();
        assert!(schedule.status_at(now).is_allowed);

        let later = Utc.with_ymd_and_hms(2024, 3, 2, 3, 0, 0).unwrap();
        let status = schedule.status_at(later);
        assert!(!status.is_allowed);
        assert_eq!(status.message, "Closed. Open hours: Fri 19:00-21:00.");
    }

    #[test]
    fn empty_schedule_is_closed() {
        let schedule = Schedule::new(Vec::new(), offset_from_minutes(0).unwrap(), "Closed.");
        let status = schedule.status_at(Utc::now());
        assert!(!status.is_allowed);
        assert!(status.message.contains("No request hours"));
    }

    #[test]
    fn window_json_uses_hhmm() {
        let w = window(1, "20:00", "23:30");
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["start_time"], "20:00");
        let back: ScheduleWindow = serde_json::from_value(json).unwrap();
        assert_eq!(back, w);
    }
}

use std::collections::BTreeMap;

use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::SongRequest;
use crate::types::Tip;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub revenue: Tip,
}

/// Tip totals over a set of requests (normally the completed history).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevenueSummary {
    pub total_revenue: Tip,
    pub total_requests: usize,
    /// Ascending by date; days are taken from `created_at` in the venue timezone.
    pub daily: Vec<DailyRevenue>,
}

pub fn summarize(requests: &[SongRequest], utc_offset: FixedOffset) -> RevenueSummary {
    let mut by_day: BTreeMap<NaiveDate, Tip> = BTreeMap::new();
    let mut total = Tip::ZERO;

    for request in requests {
        total = total.saturating_add(request.tip_amount);
        let day = request.created_at.with_timezone(&utc_offset).date_naive();
        let entry = by_day.entry(day).or_default();
        *entry = entry.saturating_add(request.tip_amount);
    }

    RevenueSummary {
        total_revenue: total,
        total_requests: requests.len(),
        daily: by_day
            .into_iter()
            .map(|(date, revenue)| DailyRevenue { date, revenue })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewSongRequest;
    use chrono::{TimeZone, Utc};

    #[test]
    fn empty_summary() {
        let summary = summarize(&[], FixedOffset::east_opt(0).unwrap());
        assert_eq!(summary.total_revenue, Tip::ZERO);
        assert_eq!(summary.total_requests, 0);
        assert!(summary.daily.is_empty());
    }

    #[test]
    fn groups_by_local_day() {
        let at = |d, h| Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap();
        let make = |cents, when| {
            SongRequest::from_submission(
                NewSongRequest::new("Song", "Artist", Tip::from_cents(cents)),
                when,
            )
        };
        let requests = vec![make(500, at(2, 3)), make(1000, at(1, 20)), make(250, at(2, 12))];

        // UTC-5: 2024-03-02 03:00Z is still March 1st locally.
        let summary = summarize(&requests, FixedOffset::west_opt(5 * 3600).unwrap());
        assert_eq!(summary.total_revenue, Tip::from_cents(1750));
        assert_eq!(summary.total_requests, 3);
        assert_eq!(summary.daily.len(), 2);
        assert_eq!(summary.daily[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(summary.daily[0].revenue, Tip::from_cents(1500));
        assert_eq!(summary.daily[1].revenue, Tip::from_cents(250));
    }
}

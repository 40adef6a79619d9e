//! Queue and history ordering.
//!
//! Both orders are recomputed from the full set of records on every call;
//! nothing is maintained incrementally.

use std::cmp::{Ordering, Reverse};

use crate::models::SongRequest;
use crate::types::PlayedStatus;

/// Higher tip first, then first come first served.
pub fn queue_order(a: &SongRequest, b: &SongRequest) -> Ordering {
    b.tip_amount
        .cmp(&a.tip_amount)
        .then_with(|| a.created_at.cmp(&b.created_at))
}

/// Most recently played first. Records that never reached `playing` fall
/// back to their creation time.
pub fn history_order(a: &SongRequest, b: &SongRequest) -> Ordering {
    let key = |r: &SongRequest| Reverse(r.played_at.unwrap_or(r.created_at));
    key(a).cmp(&key(b))
}

/// Keep `pending` and `playing` requests, sorted by [`queue_order`].
pub fn active_queue(requests: impl IntoIterator<Item = SongRequest>) -> Vec<SongRequest> {
    let mut queue: Vec<SongRequest> = requests
        .into_iter()
        .filter(|r| r.played_status.is_queued())
        .collect();
    queue.sort_by(queue_order);
    queue
}

/// Keep `completed` requests, sorted by [`history_order`].
pub fn completed_history(requests: impl IntoIterator<Item = SongRequest>) -> Vec<SongRequest> {
    let mut history: Vec<SongRequest> = requests
        .into_iter()
        .filter(|r| r.played_status == PlayedStatus::Completed)
        .collect();
    history.sort_by(history_order);
    history
}

//! The request lifecycle manager.
//!
//! Owns every operation that creates, moves or removes a song request, plus
//! the read models built on top of them (queue, history, analytics). All
//! state lives in the database; the manager itself only holds configuration.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use encore_shared::analytics::{summarize, RevenueSummary};
use encore_shared::schedule::parse_time_of_day;
use encore_shared::{
    IllegalTransition, NewSongRequest, PlayAction, RequestId, SavedSong, Schedule,
    ScheduleStatus, ScheduleWindow, SongRequest, Tip, UserId, ValidationError,
};
use encore_store::{Database, StoreError};

/// How far back a request counts towards "online" requesters.
const ONLINE_WINDOW_MINUTES: i64 = 30;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    OutsideSchedule(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl RequestError {
    fn request_not_found(id: RequestId) -> Self {
        Self::NotFound {
            kind: "Song request",
            id: id.0,
        }
    }

    /// Map a store error for an operation on request `id`.
    fn for_request(id: RequestId) -> impl FnOnce(StoreError) -> Self {
        move |err| match err {
            StoreError::NotFound => Self::request_not_found(id),
            StoreError::Transition(t) => Self::IllegalTransition(t),
            other => Self::Store(other),
        }
    }
}

impl From<StoreError> for RequestError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

pub type Result<T> = std::result::Result<T, RequestError>;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Submission rules, taken from the server configuration.
#[derive(Debug, Clone)]
pub struct SubmissionPolicy {
    /// `None` disables the minimum.
    pub minimum_tip: Option<Tip>,
    pub schedule_enforced: bool,
    pub utc_offset: FixedOffset,
    pub closed_message: String,
}

impl Default for SubmissionPolicy {
    fn default() -> Self {
        Self {
            minimum_tip: Some(Tip::from_cents(200)),
            schedule_enforced: true,
            utc_offset: Utc.fix(),
            closed_message: "Requests are closed right now.".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct LifecycleManager {
    db: Arc<Mutex<Database>>,
    policy: Arc<SubmissionPolicy>,
    clock: Arc<dyn Clock>,
}

impl LifecycleManager {
    pub fn new(db: Arc<Mutex<Database>>, policy: SubmissionPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            policy: Arc::new(policy),
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn database(&self) -> Arc<Mutex<Database>> {
        Arc::clone(&self.db)
    }

    // -- Submission ---------------------------------------------------------

    pub async fn schedule_status(&self) -> Result<ScheduleStatus> {
        if !self.policy.schedule_enforced {
            return Ok(ScheduleStatus {
                is_allowed: true,
                message: "Requests are open.".to_string(),
            });
        }
        let schedule = self.load_schedule().await?;
        Ok(schedule.status_at(self.now()))
    }

    /// Create a new `pending` request.
    ///
    /// The schedule is checked before the payload so that a closed venue
    /// answers with its opening hours regardless of what was sent.
    pub async fn submit(&self, new: NewSongRequest) -> Result<SongRequest> {
        let status = self.schedule_status().await?;
        if !status.is_allowed {
            debug!("submission rejected outside schedule");
            return Err(RequestError::OutsideSchedule(status.message));
        }

        let new = new.validate(self.policy.minimum_tip)?;
        let request = SongRequest::from_submission(new, self.now());

        self.db.lock().await.insert_song_request(&request)?;

        info!(
            id = %request.id,
            song = %request.song_name,
            artist = %request.artist_name,
            tip = %request.tip_amount,
            "song request submitted"
        );
        Ok(request)
    }

    // -- Lifecycle ----------------------------------------------------------

    pub async fn mark_playing(&self, id: RequestId) -> Result<SongRequest> {
        self.transition(id, PlayAction::Play).await
    }

    pub async fn mark_completed(&self, id: RequestId) -> Result<SongRequest> {
        self.transition(id, PlayAction::Complete).await
    }

    async fn transition(&self, id: RequestId, action: PlayAction) -> Result<SongRequest> {
        let now = self.now();
        let result = self
            .db
            .lock()
            .await
            .apply_play_action(id, action, now)
            .map_err(RequestError::for_request(id));

        match &result {
            Ok(request) => info!(id = %id, status = %request.played_status, "request moved"),
            Err(e) => warn!(id = %id, ?action, error = %e, "request transition refused"),
        }
        result
    }

    /// Remove a request in any state. Unknown ids are reported as not found.
    pub async fn delete(&self, id: RequestId) -> Result<()> {
        let deleted = self.db.lock().await.delete_song_request(id)?;
        if !deleted {
            return Err(RequestError::request_not_found(id));
        }
        info!(id = %id, "request deleted");
        Ok(())
    }

    // -- Read models --------------------------------------------------------

    pub async fn list_queue(&self) -> Result<Vec<SongRequest>> {
        Ok(self.db.lock().await.list_queue()?)
    }

    pub async fn list_history(&self) -> Result<Vec<SongRequest>> {
        Ok(self.db.lock().await.list_history()?)
    }

    pub async fn history_for_user(&self, owner: UserId) -> Result<Vec<SongRequest>> {
        Ok(self.db.lock().await.list_requests_for_user(owner)?)
    }

    pub async fn analytics(&self) -> Result<RevenueSummary> {
        let history = self.list_history().await?;
        Ok(summarize(&history, self.policy.utc_offset))
    }

    pub async fn online_requesters(&self) -> Result<Vec<UserId>> {
        let since = self.now() - Duration::minutes(ONLINE_WINDOW_MINUTES);
        Ok(self.db.lock().await.recent_requesters(since)?)
    }

    // -- Saved songs --------------------------------------------------------

    /// Bookmark one of the user's own past requests.
    pub async fn save_song(&self, owner: UserId, request_id: RequestId) -> Result<SavedSong> {
        let db = self.db.lock().await;
        let request = db
            .get_song_request(request_id)
            .map_err(RequestError::for_request(request_id))?;

        // Someone else's request looks the same as a missing one.
        if request.owner_user_id != Some(owner) {
            return Err(RequestError::request_not_found(request_id));
        }

        let saved = db.save_song(&SavedSong::from_request(&request, owner, self.now()))?;
        debug!(owner = %owner, saved = %saved.id, "song saved");
        Ok(saved)
    }

    pub async fn list_saved_songs(&self, owner: UserId) -> Result<Vec<SavedSong>> {
        Ok(self.db.lock().await.list_saved_songs(owner)?)
    }

    pub async fn delete_saved_song(&self, owner: UserId, id: Uuid) -> Result<()> {
        if !self.db.lock().await.delete_saved_song(owner, id)? {
            return Err(RequestError::NotFound {
                kind: "Saved song",
                id,
            });
        }
        Ok(())
    }

    // -- Schedule administration -------------------------------------------

    pub async fn list_schedule_windows(&self) -> Result<Vec<ScheduleWindow>> {
        Ok(self.db.lock().await.list_schedule_windows()?)
    }

    pub async fn add_schedule_window(
        &self,
        day_of_week: u8,
        start_time: &str,
        end_time: &str,
        is_active: bool,
    ) -> Result<ScheduleWindow> {
        let window = ScheduleWindow::new(
            day_of_week,
            parse_time_of_day(start_time)?,
            parse_time_of_day(end_time)?,
            is_active,
            self.now(),
        )?;
        self.db.lock().await.insert_schedule_window(&window)?;
        info!(window = %window.label(), active = is_active, "schedule window added");
        Ok(window)
    }

    pub async fn set_schedule_window_active(&self, id: Uuid, active: bool) -> Result<ScheduleWindow> {
        self.db
            .lock()
            .await
            .set_schedule_window_active(id, active)
            .map_err(|e| match e {
                StoreError::NotFound => RequestError::NotFound {
                    kind: "Schedule window",
                    id,
                },
                other => RequestError::Store(other),
            })
    }

    pub async fn delete_schedule_window(&self, id: Uuid) -> Result<()> {
        if !self.db.lock().await.delete_schedule_window(id)? {
            return Err(RequestError::NotFound {
                kind: "Schedule window",
                id,
            });
        }
        Ok(())
    }

    async fn load_schedule(&self) -> Result<Schedule> {
        let windows = self.db.lock().await.list_schedule_windows()?;
        Ok(Schedule::new(
            windows,
            self.policy.utc_offset,
            self.policy.closed_message.clone(),
        ))
    }
}

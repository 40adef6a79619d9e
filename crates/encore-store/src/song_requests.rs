use chrono::{DateTime, Utc};
use encore_shared::ordering::{active_queue, completed_history};
use encore_shared::{IllegalTransition, PaymentStatus, PlayAction, RequestId, SongRequest, Tip, UserId};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::rows;

const COLUMNS: &str = "id, song_name, artist_name, genre, requester_name, contact_handle, \
     tip_cents, payment_status, played_status, created_at, played_at, owner_user_id, \
     payment_session_id, payment_verified_at, updated_at";

impl Database {
    pub fn insert_song_request(&self, request: &SongRequest) -> Result<()> {
        self.conn().execute(
            &format!(
                "INSERT INTO song_requests ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ),
            params![
                request.id.to_string(),
                request.song_name,
                request.artist_name,
                request.genre,
                request.requester_name,
                request.contact_handle,
                rows::cents(request.tip_amount.cents()),
                request.payment_status.as_str(),
                request.played_status.as_str(),
                rows::timestamp(request.created_at),
                request.played_at.map(rows::timestamp),
                request.owner_user_id.map(|u| u.to_string()),
                request.payment_session_id,
                request.payment_verified_at.map(rows::timestamp),
                rows::timestamp(request.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_song_request(&self, id: RequestId) -> Result<SongRequest> {
        self.conn()
            .query_row(
                &format!("SELECT {COLUMNS} FROM song_requests WHERE id = ?1"),
                params![id.to_string()],
                row_to_song_request,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Pending and playing requests: highest tip first, oldest first on ties.
    pub fn list_queue(&self) -> Result<Vec<SongRequest>> {
        let requests = self.select_requests(
            "WHERE played_status IN ('pending', 'playing')",
            params![],
        )?;
        Ok(active_queue(requests))
    }

    /// Completed requests, most recently played first.
    pub fn list_history(&self) -> Result<Vec<SongRequest>> {
        let requests = self.select_requests("WHERE played_status = 'completed'", params![])?;
        Ok(completed_history(requests))
    }

    /// Every request a user has made, newest first.
    pub fn list_requests_for_user(&self, owner: UserId) -> Result<Vec<SongRequest>> {
        self.select_requests(
            "WHERE owner_user_id = ?1 ORDER BY created_at DESC",
            params![owner.to_string()],
        )
    }

    /// Move a request forward in its lifecycle with a compare-and-set on the
    /// stored status.
    ///
    /// The row is only updated if its `played_status` is still the one the
    /// transition was validated against. If another writer got there first,
    /// the error reports the state that writer left behind.
    pub fn apply_play_action(
        &self,
        id: RequestId,
        action: PlayAction,
        now: DateTime<Utc>,
    ) -> Result<SongRequest> {
        let mut request = self.get_song_request(id)?;
        let expected = request.played_status;
        request.apply(action, now)?;

        let affected = self.conn().execute(
            "UPDATE song_requests
             SET played_status = ?1,
                 played_at = COALESCE(played_at, ?2),
                 updated_at = ?3
             WHERE id = ?4 AND played_status = ?5",
            params![
                request.played_status.as_str(),
                request.played_at.map(rows::timestamp),
                rows::timestamp(now),
                id.to_string(),
                expected.as_str(),
            ],
        )?;

        if affected == 0 {
            let current = self.get_song_request(id)?;
            tracing::debug!(
                id = %id,
                expected = %expected,
                found = %current.played_status,
                "conditional status update lost"
            );
            return Err(IllegalTransition {
                from: current.played_status,
                to: action.target_status(),
            }
            .into());
        }

        Ok(request)
    }

    pub fn delete_song_request(&self, id: RequestId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM song_requests WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Distinct users with at least one request created at or after `since`.
    pub fn recent_requesters(&self, since: DateTime<Utc>) -> Result<Vec<UserId>> {
        let mut stmt = self.conn().prepare(
            "SELECT DISTINCT owner_user_id FROM song_requests
             WHERE owner_user_id IS NOT NULL AND created_at >= ?1
             ORDER BY owner_user_id",
        )?;
        let rows = stmt.query_map(params![rows::timestamp(since)], |row| {
            rows::uuid_at(row, 0).map(UserId)
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Remember which checkout session pays for this request.
    pub fn bind_payment_session(
        &self,
        id: RequestId,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE song_requests SET payment_session_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![session_id, rows::timestamp(now), id.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Record a payment outcome on request `id`.
    ///
    /// A request that is already paid keeps that status: a later session for
    /// the same request that expires unpaid must not undo an earlier payment.
    /// Returns `false` when nothing changed (request gone or already paid).
    pub fn set_payment_status(
        &self,
        id: RequestId,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let settles = matches!(status, PaymentStatus::Paid | PaymentStatus::Verified);
        let verified_at = settles.then(|| rows::timestamp(now));
        let affected = self.conn().execute(
            "UPDATE song_requests
             SET payment_status = ?1,
                 payment_verified_at = COALESCE(?2, payment_verified_at),
                 updated_at = ?3
             WHERE id = ?4
               AND (?5 OR payment_status NOT IN ('paid', 'verified'))",
            params![status.as_str(), verified_at, rows::timestamp(now), id.to_string(), settles],
        )?;
        Ok(affected > 0)
    }

    fn select_requests<P: rusqlite::Params>(&self, clause: &str, params: P) -> Result<Vec<SongRequest>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("SELECT {COLUMNS} FROM song_requests {clause}"))?;
        let rows = stmt.query_map(params, row_to_song_request)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

fn row_to_song_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<SongRequest> {
    Ok(SongRequest {
        id: RequestId(rows::uuid_at(row, 0)?),
        song_name: row.get(1)?,
        artist_name: row.get(2)?,
        genre: row.get(3)?,
        requester_name: row.get(4)?,
        contact_handle: row.get(5)?,
        tip_amount: Tip::from_cents(rows::cents_at(row, 6)?),
        payment_status: rows::parsed_at(row, 7)?,
        played_status: rows::parsed_at(row, 8)?,
        created_at: rows::timestamp_at(row, 9)?,
        played_at: rows::opt_timestamp_at(row, 10)?,
        owner_user_id: rows::opt_uuid_at(row, 11)?.map(UserId),
        payment_session_id: row.get(12)?,
        payment_verified_at: rows::opt_timestamp_at(row, 13)?,
        updated_at: rows::timestamp_at(row, 14)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use encore_shared::{NewSongRequest, PlayedStatus};
    use std::sync::Barrier;
    use uuid::Uuid;

    fn submit(db: &Database, name: &str, cents: u64, at: DateTime<Utc>) -> SongRequest {
        let new = NewSongRequest::new(name, "Artist", Tip::from_cents(cents));
        let request = SongRequest::from_submission(new, at);
        db.insert_song_request(&request).unwrap();
        request
    }

    #[test]
    fn insert_and_get_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let mut new = NewSongRequest::new("Gasolina", "Daddy Yankee", Tip::from_cents(500));
        new.genre = Some("Reggaeton".into());
        new.owner_user_id = Some(UserId(Uuid::new_v4()));
        let request = SongRequest::from_submission(new, Utc::now());
        db.insert_song_request(&request).unwrap();

        let loaded = db.get_song_request(request.id).unwrap();
        assert_eq!(loaded, request);
    }

    #[test]
    fn missing_request_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.get_song_request(RequestId::new()),
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            db.apply_play_action(RequestId::new(), PlayAction::Play, Utc::now()),
            Err(StoreError::NotFound)
        ));
        assert!(!db.delete_song_request(RequestId::new()).unwrap());
    }

    #[test]
    fn queue_and_history_from_storage() {
        let db = Database::open_in_memory().unwrap();
        let t0 = Utc::now();
        let gasolina = submit(&db, "Gasolina", 500, t0);
        let thriller = submit(&db, "Thriller", 1000, t0 + Duration::seconds(1));

        let queue = db.list_queue().unwrap();
        assert_eq!(queue[0].id, thriller.id);
        assert_eq!(queue[1].id, gasolina.id);

        db.apply_play_action(gasolina.id, PlayAction::Play, t0 + Duration::minutes(1))
            .unwrap();
        db.apply_play_action(gasolina.id, PlayAction::Complete, t0 + Duration::minutes(4))
            .unwrap();

        let queue = db.list_queue().unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, thriller.id);

        let history = db.list_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].played_at, Some(t0 + Duration::minutes(1)));
    }

    #[test]
    fn transitions_are_strict() {
        let db = Database::open_in_memory().unwrap();
        let request = submit(&db, "Song", 200, Utc::now());

        let err = db
            .apply_play_action(request.id, PlayAction::Complete, Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Transition(IllegalTransition {
                from: PlayedStatus::Pending,
                to: PlayedStatus::Completed
            })
        ));

        let played = db
            .apply_play_action(request.id, PlayAction::Play, Utc::now())
            .unwrap();
        let played_at = played.played_at.unwrap();

        assert!(db
            .apply_play_action(request.id, PlayAction::Play, Utc::now() + Duration::hours(1))
            .is_err());
        let stored = db.get_song_request(request.id).unwrap();
        assert_eq!(stored.played_status, PlayedStatus::Playing);
        assert_eq!(stored.played_at, Some(played_at));
    }

    #[test]
    fn concurrent_play_has_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("race.db");
        let db = Database::open_at(&path).unwrap();
        let request = submit(&db, "Song", 500, Utc::now());

        let barrier = Barrier::new(2);
        let results: Vec<Result<SongRequest>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    s.spawn(|| {
                        let conn = Database::open_at(&path).unwrap();
                        barrier.wait();
                        conn.apply_play_action(request.id, PlayAction::Play, Utc::now())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(StoreError::Transition(_)))));

        let stored = db.get_song_request(request.id).unwrap();
        assert_eq!(stored.played_status, PlayedStatus::Playing);
        let winner = results.into_iter().find_map(|r| r.ok()).unwrap();
        assert_eq!(stored.played_at, winner.played_at);
    }

    #[test]
    fn user_history_and_recent_requesters() {
        let db = Database::open_in_memory().unwrap();
        let user = UserId(Uuid::new_v4());
        let t0 = Utc::now();

        for (i, name) in ["first", "second"].iter().enumerate() {
            let mut new = NewSongRequest::new(*name, "Artist", Tip::from_cents(200));
            new.owner_user_id = Some(user);
            let request = SongRequest::from_submission(new, t0 + Duration::minutes(i as i64));
            db.insert_song_request(&request).unwrap();
        }
        submit(&db, "anonymous", 200, t0);

        let mine = db.list_requests_for_user(user).unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].song_name, "second");

        assert_eq!(db.recent_requesters(t0).unwrap(), vec![user]);
        assert!(db
            .recent_requesters(t0 + Duration::hours(1))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn payment_status_is_recorded_per_request() {
        let db = Database::open_in_memory().unwrap();
        let request = submit(&db, "Song", 500, Utc::now());
        db.bind_payment_session(request.id, "cs_test_1", Utc::now())
            .unwrap();

        assert!(db
            .set_payment_status(request.id, PaymentStatus::Paid, Utc::now())
            .unwrap());

        let stored = db.get_song_request(request.id).unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
        assert!(stored.payment_verified_at.is_some());
        // Payment never touches the play axis.
        assert_eq!(stored.played_status, PlayedStatus::Pending);

        // A later failed session does not undo the payment.
        assert!(!db
            .set_payment_status(request.id, PaymentStatus::Failed, Utc::now())
            .unwrap());
        let stored = db.get_song_request(request.id).unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);

        assert!(!db
            .set_payment_status(RequestId::new(), PaymentStatus::Paid, Utc::now())
            .unwrap());
        assert!(matches!(
            db.bind_payment_session(RequestId::new(), "cs_other", Utc::now()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn unpaid_outcomes_overwrite_each_other() {
        let db = Database::open_in_memory().unwrap();
        let request = submit(&db, "Song", 500, Utc::now());

        assert!(db
            .set_payment_status(request.id, PaymentStatus::Failed, Utc::now())
            .unwrap());
        assert!(db
            .set_payment_status(request.id, PaymentStatus::Pending, Utc::now())
            .unwrap());
        let stored = db.get_song_request(request.id).unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
        assert!(stored.payment_verified_at.is_none());
    }
}

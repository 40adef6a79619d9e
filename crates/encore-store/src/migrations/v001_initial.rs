//! v001 -- Initial schema creation.
//!
//! Creates the `song_requests` and `saved_songs` tables.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Song requests
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS song_requests (
    id                  TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    song_name           TEXT NOT NULL,
    artist_name         TEXT NOT NULL,
    genre               TEXT,
    requester_name      TEXT,
    contact_handle      TEXT,
    tip_cents           INTEGER NOT NULL CHECK (tip_cents >= 0),
    payment_status      TEXT NOT NULL DEFAULT 'pending',
    played_status       TEXT NOT NULL DEFAULT 'pending',
    created_at          TEXT NOT NULL,              -- RFC-3339
    played_at           TEXT,                       -- set once, on play
    owner_user_id       TEXT,                       -- weak reference, no FK
    payment_session_id  TEXT,
    payment_verified_at TEXT,
    updated_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_song_requests_played_status
    ON song_requests(played_status);
CREATE INDEX IF NOT EXISTS idx_song_requests_owner
    ON song_requests(owner_user_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_song_requests_session
    ON song_requests(payment_session_id);

-- ----------------------------------------------------------------
-- Saved songs (per-user bookmarks)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS saved_songs (
    id            TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    song_name     TEXT NOT NULL,
    artist_name   TEXT NOT NULL,
    genre         TEXT,
    tip_cents     INTEGER NOT NULL DEFAULT 0,
    owner_user_id TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_saved_songs_unique
    ON saved_songs(owner_user_id, song_name, artist_name);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}

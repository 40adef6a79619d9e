use encore_shared::{SavedSong, Tip, UserId};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::rows;

impl Database {
    /// Save a song for a user. Saving the same song and artist twice keeps
    /// the first record and returns it.
    pub fn save_song(&self, song: &SavedSong) -> Result<SavedSong> {
        self.conn().execute(
            "INSERT OR IGNORE INTO saved_songs
                 (id, song_name, artist_name, genre, tip_cents, owner_user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                song.id.to_string(),
                song.song_name,
                song.artist_name,
                song.genre,
                rows::cents(song.tip_amount.cents()),
                song.owner_user_id.to_string(),
                rows::timestamp(song.created_at),
            ],
        )?;

        self.find_saved_song(song.owner_user_id, &song.song_name, &song.artist_name)?
            .ok_or(StoreError::NotFound)
    }

    pub fn find_saved_song(
        &self,
        owner: UserId,
        song_name: &str,
        artist_name: &str,
    ) -> Result<Option<SavedSong>> {
        self.conn()
            .query_row(
                "SELECT id, song_name, artist_name, genre, tip_cents, owner_user_id, created_at
                 FROM saved_songs
                 WHERE owner_user_id = ?1 AND song_name = ?2 AND artist_name = ?3",
                params![owner.to_string(), song_name, artist_name],
                row_to_saved_song,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    /// A user's saved songs, newest first.
    pub fn list_saved_songs(&self, owner: UserId) -> Result<Vec<SavedSong>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, song_name, artist_name, genre, tip_cents, owner_user_id, created_at
             FROM saved_songs WHERE owner_user_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![owner.to_string()], row_to_saved_song)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Delete a saved song, scoped to its owner. Returns `false` when the
    /// record does not exist or belongs to someone else.
    pub fn delete_saved_song(&self, owner: UserId, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM saved_songs WHERE id = ?1 AND owner_user_id = ?2",
            params![id.to_string(), owner.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_saved_song(row: &rusqlite::Row<'_>) -> rusqlite::Result<SavedSong> {
    Ok(SavedSong {
        id: rows::uuid_at(row, 0)?,
        song_name: row.get(1)?,
        artist_name: row.get(2)?,
        genre: row.get(3)?,
        tip_amount: Tip::from_cents(rows::cents_at(row, 4)?),
        owner_user_id: UserId(rows::uuid_at(row, 5)?),
        created_at: rows::timestamp_at(row, 6)?,
    })
}

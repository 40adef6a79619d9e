use encore_shared::schedule::parse_time_of_day;
use encore_shared::ScheduleWindow;
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::rows;

impl Database {
    pub fn insert_schedule_window(&self, window: &ScheduleWindow) -> Result<()> {
        self.conn().execute(
            "INSERT INTO schedule_windows (id, day_of_week, start_time, end_time, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                window.id.to_string(),
                window.day_of_week,
                window.start_time.format("%H:%M").to_string(),
                window.end_time.format("%H:%M").to_string(),
                window.is_active,
                rows::timestamp(window.created_at),
            ],
        )?;
        Ok(())
    }

    /// All windows, ordered through the week.
    pub fn list_schedule_windows(&self) -> Result<Vec<ScheduleWindow>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, day_of_week, start_time, end_time, is_active, created_at
             FROM schedule_windows ORDER BY day_of_week ASC, start_time ASC",
        )?;
        let rows = stmt.query_map([], row_to_window)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn set_schedule_window_active(&self, id: Uuid, active: bool) -> Result<ScheduleWindow> {
        let affected = self.conn().execute(
            "UPDATE schedule_windows SET is_active = ?1 WHERE id = ?2",
            params![active, id.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.conn()
            .query_row(
                "SELECT id, day_of_week, start_time, end_time, is_active, created_at
                 FROM schedule_windows WHERE id = ?1",
                params![id.to_string()],
                row_to_window,
            )
            .map_err(StoreError::Sqlite)
    }

    pub fn delete_schedule_window(&self, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM schedule_windows WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_window(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduleWindow> {
    let start: String = row.get(2)?;
    let end: String = row.get(3)?;
    let time = |idx: usize, raw: &str| {
        parse_time_of_day(raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    };

    Ok(ScheduleWindow {
        id: rows::uuid_at(row, 0)?,
        day_of_week: row.get(1)?,
        start_time: time(2, &start)?,
        end_time: time(3, &end)?,
        is_active: row.get(4)?,
        created_at: rows::timestamp_at(row, 5)?,
    })
}

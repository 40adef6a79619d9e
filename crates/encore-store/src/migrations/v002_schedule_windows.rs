use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schedule_windows (
    id          TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    day_of_week INTEGER NOT NULL CHECK (day_of_week BETWEEN 0 AND 6),  -- 0 = Sunday
    start_time  TEXT NOT NULL,                 -- HH:MM, venue local time
    end_time    TEXT NOT NULL,                 -- HH:MM, <= start wraps past midnight
    is_active   INTEGER NOT NULL DEFAULT 1,    -- boolean 0/1
    created_at  TEXT NOT NULL
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS payments (
    id                TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    song_request_id   TEXT,                        -- FK -> song_requests(id)
    session_id        TEXT NOT NULL,               -- processor checkout session
    amount_cents      INTEGER NOT NULL,
    currency          TEXT NOT NULL DEFAULT 'usd',
    status            TEXT NOT NULL DEFAULT 'pending',
    payment_intent_id TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL,

    FOREIGN KEY (song_request_id) REFERENCES song_requests(id) ON DELETE SET NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_payments_session ON payments(session_id);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}

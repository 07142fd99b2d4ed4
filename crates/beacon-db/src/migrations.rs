use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            mobile_number   TEXT NOT NULL,
            email           TEXT,
            age             INTEGER NOT NULL,
            gender          TEXT NOT NULL,
            last_latitude   REAL,
            last_longitude  REAL,
            last_seen_at    TEXT,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    info!("Directory migrations complete");
    Ok(())
}

//! SQLite schema matching the emitted script.

use sqlx::SqliteConnection;
use tracing::info;

use crate::db::executor::{ExecuteError, execute_statements, split_statements};

/// DDL for the four target tables.
///
/// Calendar ids repeat across sessions, so calendars are keyed by
/// (id, session_id).
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    role TEXT,
    team TEXT,
    reports_to TEXT,
    profile TEXT,
    created_at TEXT,
    session_id TEXT
);

CREATE TABLE IF NOT EXISTS calendars (
    id TEXT NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id),
    name TEXT NOT NULL,
    color TEXT,
    text_color TEXT,
    created_at TEXT,
    session_id TEXT,
    PRIMARY KEY (id, session_id)
);

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    calendar_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    location TEXT,
    is_all_day INTEGER NOT NULL DEFAULT 0,
    recurrence_rule TEXT,
    created_at TEXT,
    updated_at TEXT,
    session_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id, user_id, title);

CREATE TABLE IF NOT EXISTS attendees (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id INTEGER NOT NULL REFERENCES events(id),
    user_id INTEGER NOT NULL REFERENCES users(id),
    role TEXT NOT NULL,
    status TEXT NOT NULL,
    responded_at TEXT,
    session_id TEXT
);
"#;

/// Creates any missing tables.
pub async fn apply_schema(conn: &mut SqliteConnection) -> Result<(), ExecuteError> {
    let statements = split_statements(SCHEMA);
    execute_statements(conn, &statements).await?;
    info!("Schema ready ({} statements)", statements.len());
    Ok(())
}

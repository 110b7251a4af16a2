//! Database seeding utilities.

use std::path::Path;

use sqlx::{Connection, SqliteConnection};
use thiserror::Error;
use tracing::info;

use crate::db::executor::{ExecuteError, ExecutionReport, ScriptBindings, execute_script};
use crate::db::schema::apply_schema;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Execution error: {0}")]
    Execute(#[from] ExecuteError),
}

/// Writes generated scripts and replays them against SQLite.
///
/// Holds a single connection: the attendee inserts read from a temporary
/// table that only exists on the connection that created it.
pub struct Seeder {
    conn: SqliteConnection,
}

impl Seeder {
    /// Creates a new seeder around an open connection.
    pub fn new(conn: SqliteConnection) -> Self {
        Self { conn }
    }

    /// Opens `url` (e.g. `sqlite://calendar.db?mode=rwc`).
    pub async fn connect(url: &str) -> Result<Self, SeedError> {
        Ok(Self::new(SqliteConnection::connect(url).await?))
    }

    /// Creates the target tables if they are missing.
    pub async fn prepare(&mut self) -> Result<(), SeedError> {
        apply_schema(&mut self.conn).await?;
        Ok(())
    }

    /// Executes a script with the given bindings.
    pub async fn seed_script(
        &mut self,
        script: &str,
        bindings: &ScriptBindings,
    ) -> Result<ExecutionReport, SeedError> {
        Ok(execute_script(&mut self.conn, script, bindings).await?)
    }

    /// Executes the script stored at `path`.
    pub async fn seed_file(
        &mut self,
        path: impl AsRef<Path>,
        bindings: &ScriptBindings,
    ) -> Result<ExecutionReport, SeedError> {
        let path = path.as_ref();
        info!("Seeding from {}", path.display());
        let script = tokio::fs::read_to_string(path).await?;
        self.seed_script(&script, bindings).await
    }

    /// Access to the underlying connection, e.g. for verification queries.
    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    /// Closes the connection.
    pub async fn close(self) -> Result<(), SeedError> {
        self.conn.close().await?;
        Ok(())
    }
}

/// Writes `script` to `path`, creating parent directories.
pub async fn write_script(path: impl AsRef<Path>, script: &str) -> Result<(), SeedError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, script).await?;
    info!("Wrote {} bytes to {}", script.len(), path.display());
    Ok(())
}

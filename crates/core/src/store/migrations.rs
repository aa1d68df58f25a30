//! Database schema migrations.
//!
//! A `_migrations` table records the highest applied version; each pending
//! migration runs as one SQL batch and is recorded right after.

use super::Error;
use tokio_rusqlite::{Connection, params};

/// Migration list: (version, description, SQL).
///
/// Versions must be strictly increasing. All migrations are idempotent
/// using CREATE IF NOT EXISTS.
const MIGRATIONS: &[(i64, &str, &str)] =
    &[(1, "sitemap entries", include_str!("../../migrations/001_sitemap_entries.sql"))];

/// Run any pending migrations.
///
/// # Errors
///
/// Returns an error if a migration SQL fails to execute, or if the recorded
/// version is newer than any migration this build knows about.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current: i64 =
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        let latest = MIGRATIONS.last().map_or(0, |(version, _, _)| *version);
        if current > latest {
            return Err(Error::MigrationFailed(format!(
                "database schema version {current} is newer than supported version {latest}"
            )));
        }

        for (version, description, sql) in MIGRATIONS.iter().filter(|(version, _, _)| *version > current) {
            conn.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("{description} (v{version}): {e}")))?;
            conn.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tracing::info!(version, description, "applied migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

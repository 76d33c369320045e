use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::types::DatabaseError;

// ============================================================================
// Database
// ============================================================================

/// SQLite-backed podcast store.
///
/// Cloning is cheap; clones share the pool and the change notifier.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
    /// Bumped after every podcast or episode mutation
    pub(crate) changes: Arc<watch::Sender<u64>>,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// `":memory:"` opens a private in-memory database shared by the pool.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InstanceLocked` if another process has the
    /// database locked (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN).
    /// Returns `DatabaseError::Other` for other database errors.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // SEC-010: Create the database file user-only before SQLite touches it
        #[cfg(unix)]
        if path != ":memory:" {
            use std::os::unix::fs::OpenOptionsExt;
            let db_path = std::path::Path::new(path);
            if !db_path.exists() && db_path.parent().is_some_and(|p| p.exists()) {
                let _file = std::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .mode(0o600)
                    .open(db_path)
                    .ok(); // If creation fails, SQLite will report the error at connect_with.
            }
        }

        // busy_timeout=5000: a scheduled update and a CLI command may write concurrently
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .foreign_keys(true)
            .pragma("busy_timeout", "5000");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let (changes, _) = watch::channel(0);
        let db = Self {
            pool,
            changes: Arc::new(changes),
        };
        db.migrate().await.map_err(|e| {
            let error_string = e.to_string().to_lowercase();
            if error_string.contains("database is locked")
                || error_string.contains("database table is locked")
                || error_string.contains("sqlite_busy")
                || error_string.contains("sqlite_locked")
            {
                DatabaseError::InstanceLocked
            } else {
                DatabaseError::Migration(e.to_string())
            }
        })?;
        tracing::debug!(path = %path, "Database ready");
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All migrations use `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS podcasts (
                id INTEGER PRIMARY KEY,
                feed_url TEXT UNIQUE NOT NULL,
                feed_title TEXT NOT NULL,
                feed_desc TEXT NOT NULL,
                image_url TEXT NOT NULL,
                last_updated INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS episodes (
                id INTEGER PRIMARY KEY,
                podcast_id INTEGER NOT NULL REFERENCES podcasts(id) ON DELETE CASCADE,
                guid TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                media_url TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                release_date INTEGER NOT NULL,
                duration TEXT NOT NULL,
                UNIQUE(podcast_id, guid)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // load_episodes filters by podcast and sorts newest first
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_episodes_podcast_release ON episodes(podcast_id, release_date DESC)",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_podcasts_title ON podcasts(feed_title)")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Signals watchers that stored podcasts changed.
    pub(crate) fn notify_changed(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }
}

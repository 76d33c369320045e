use tokio::sync::watch;

use super::schema::Database;
use super::types::{DatabaseError, Podcast, PodcastId, PodcastRow, SubscribedPodcast};

const PODCAST_COLUMNS: &str = "id, feed_url, feed_title, feed_desc, image_url, last_updated";

impl Database {
    // ========================================================================
    // Podcast Operations
    // ========================================================================

    /// Find a stored podcast by feed URL. Episodes are not loaded.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Other`] if the query fails.
    pub async fn load_podcast(&self, feed_url: &str) -> Result<Option<SubscribedPodcast>, DatabaseError> {
        let row: Option<PodcastRow> = sqlx::query_as(&format!(
            "SELECT {PODCAST_COLUMNS} FROM podcasts WHERE feed_url = ?"
        ))
        .bind(feed_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(PodcastRow::into_subscribed))
    }

    /// Snapshot of every stored podcast, ordered by title. Episodes are not loaded.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Other`] if the query fails.
    pub async fn load_podcasts_static(&self) -> Result<Vec<SubscribedPodcast>, DatabaseError> {
        let rows: Vec<PodcastRow> = sqlx::query_as(&format!(
            "SELECT {PODCAST_COLUMNS} FROM podcasts ORDER BY feed_title"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PodcastRow::into_subscribed).collect())
    }

    /// Insert a podcast, or update the row with the same feed URL.
    ///
    /// The id of an existing row is kept, so its episodes stay attached.
    /// Episodes in `podcast.episodes` are not written here.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Other`] if the upsert fails. Watchers are
    /// only notified on success.
    pub async fn insert_podcast(&self, podcast: &Podcast) -> Result<PodcastId, DatabaseError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO podcasts (feed_url, feed_title, feed_desc, image_url, last_updated)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(feed_url) DO UPDATE SET
                feed_title = excluded.feed_title,
                feed_desc = excluded.feed_desc,
                image_url = excluded.image_url,
                last_updated = excluded.last_updated
            RETURNING id
            "#,
        )
        .bind(&podcast.feed_url)
        .bind(&podcast.feed_title)
        .bind(&podcast.feed_desc)
        .bind(&podcast.image_url)
        .bind(podcast.last_updated.timestamp())
        .fetch_one(&self.pool)
        .await?;

        self.notify_changed();
        Ok(PodcastId(id))
    }

    /// Delete a podcast; its episodes go with it (ON DELETE CASCADE).
    ///
    /// Deleting an unknown id is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Other`] if the delete fails.
    pub async fn delete_podcast(&self, id: PodcastId) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM podcasts WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            tracing::debug!(podcast_id = %id, "Delete of unknown podcast ignored");
        }
        self.notify_changed();
        Ok(())
    }

    /// Observe the stored podcast list.
    pub fn watch_podcasts(&self) -> PodcastListWatcher {
        PodcastListWatcher {
            db: self.clone(),
            changes: self.changes.subscribe(),
            primed: false,
        }
    }
}

/// Live view of the subscribed podcasts.
///
/// The first [`next`](Self::next) returns the current list immediately;
/// later calls wait for the next store mutation and return the fresh list.
pub struct PodcastListWatcher {
    db: Database,
    changes: watch::Receiver<u64>,
    primed: bool,
}

impl PodcastListWatcher {
    /// `None` once the database handle that fed this watcher is gone.
    ///
    /// # Errors
    ///
    /// Yields `Some(Err(_))` if reloading the list fails. The watcher stays
    /// usable and the next mutation triggers another reload.
    pub async fn next(&mut self) -> Option<Result<Vec<SubscribedPodcast>, DatabaseError>> {
        if self.primed {
            self.changes.changed().await.ok()?;
        } else {
            self.primed = true;
        }
        self.changes.borrow_and_update();
        Some(self.db.load_podcasts_static().await)
    }
}

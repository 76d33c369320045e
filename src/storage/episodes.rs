use super::schema::Database;
use super::types::{DatabaseError, Episode, EpisodeRow, PodcastId};

const UPSERT_EPISODE: &str = r#"
    INSERT INTO episodes
        (podcast_id, guid, title, description, media_url, mime_type, release_date, duration)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(podcast_id, guid) DO UPDATE SET
        title = excluded.title,
        description = excluded.description,
        media_url = excluded.media_url,
        mime_type = excluded.mime_type,
        release_date = excluded.release_date,
        duration = excluded.duration
    RETURNING id
"#;

impl Database {
    // ========================================================================
    // Episode Operations
    // ========================================================================

    /// Episodes of one podcast, newest first.
    pub async fn load_episodes(&self, podcast_id: PodcastId) -> Result<Vec<Episode>, DatabaseError> {
        let rows: Vec<EpisodeRow> = sqlx::query_as(
            r#"
            SELECT guid, title, description, media_url, mime_type, release_date, duration
            FROM episodes
            WHERE podcast_id = ?
            ORDER BY release_date DESC, id DESC
            "#,
        )
        .bind(podcast_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(EpisodeRow::into_episode).collect())
    }

    /// Insert an episode under `podcast_id`, replacing one with the same guid.
    pub async fn insert_episode(
        &self,
        podcast_id: PodcastId,
        episode: &Episode,
    ) -> Result<i64, DatabaseError> {
        let (id,): (i64,) = bind_episode(sqlx::query_as(UPSERT_EPISODE), podcast_id, episode)
            .fetch_one(&self.pool)
            .await?;
        self.notify_changed();
        Ok(id)
    }

    /// Insert several episodes under `podcast_id` in one transaction.
    ///
    /// Either every episode is written or none is. Returns how many were
    /// written.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Other`] if any insert or the commit fails;
    /// the transaction is rolled back.
    pub async fn insert_episodes(
        &self,
        podcast_id: PodcastId,
        episodes: &[Episode],
    ) -> Result<usize, DatabaseError> {
        if episodes.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for episode in episodes {
            let _: (i64,) = bind_episode(sqlx::query_as(UPSERT_EPISODE), podcast_id, episode)
                .fetch_one(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        self.notify_changed();
        Ok(episodes.len())
    }
}

fn bind_episode<'q>(
    query: sqlx::query::QueryAs<'q, sqlx::Sqlite, (i64,), sqlx::sqlite::SqliteArguments<'q>>,
    podcast_id: PodcastId,
    episode: &'q Episode,
) -> sqlx::query::QueryAs<'q, sqlx::Sqlite, (i64,), sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(podcast_id.0)
        .bind(&episode.guid)
        .bind(&episode.title)
        .bind(&episode.description)
        .bind(&episode.media_url)
        .bind(&episode.mime_type)
        .bind(episode.release_date.timestamp())
        .bind(&episode.duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Podcast;
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    async fn db_with_podcast() -> (Database, PodcastId) {
        let db = Database::open(":memory:").await.unwrap();
        let id = db
            .insert_podcast(&Podcast {
                feed_url: "https://a.example/feed".into(),
                feed_title: "A".into(),
                feed_desc: String::new(),
                image_url: String::new(),
                last_updated: Utc::now(),
                episodes: Vec::new(),
            })
            .await
            .unwrap();
        (db, id)
    }

    fn episode(guid: &str, title: &str, release: DateTime<Utc>) -> Episode {
        Episode {
            guid: guid.into(),
            title: title.into(),
            description: "d".into(),
            media_url: format!("https://cdn.example/{guid}.mp3"),
            mime_type: "audio/mpeg".into(),
            release_date: release,
            duration: "10:00".into(),
        }
    }

    #[tokio::test]
    async fn test_episodes_newest_first() {
        let (db, id) = db_with_podcast().await;
        let jan = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let feb = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        db.insert_episode(id, &episode("old", "Old", jan)).await.unwrap();
        db.insert_episode(id, &episode("new", "New", feb)).await.unwrap();

        let episodes = db.load_episodes(id).await.unwrap();
        assert_eq!(episodes, vec![episode("new", "New", feb), episode("old", "Old", jan)]);
    }

    #[tokio::test]
    async fn test_same_guid_replaces_episode() {
        let (db, id) = db_with_podcast().await;
        let when = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let first = db.insert_episode(id, &episode("g", "First", when)).await.unwrap();
        let second = db.insert_episode(id, &episode("g", "Second", when)).await.unwrap();
        assert_eq!(first, second);

        let episodes = db.load_episodes(id).await.unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].title, "Second");
    }

    #[tokio::test]
    async fn test_same_guid_allowed_across_podcasts() {
        let (db, id) = db_with_podcast().await;
        let other = db
            .insert_podcast(&Podcast {
                feed_url: "https://b.example/feed".into(),
                feed_title: "B".into(),
                feed_desc: String::new(),
                image_url: String::new(),
                last_updated: Utc::now(),
                episodes: Vec::new(),
            })
            .await
            .unwrap();
        let when = Utc::now();
        db.insert_episode(id, &episode("shared", "A's", when)).await.unwrap();
        db.insert_episode(other, &episode("shared", "B's", when)).await.unwrap();

        assert_eq!(db.load_episodes(id).await.unwrap()[0].title, "A's");
        assert_eq!(db.load_episodes(other).await.unwrap()[0].title, "B's");
    }

    #[tokio::test]
    async fn test_insert_episodes_batch() {
        let (db, id) = db_with_podcast().await;
        let when = Utc::now();
        let inserted = db
            .insert_episodes(id, &[episode("a", "A", when), episode("b", "B", when)])
            .await
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(db.load_episodes(id).await.unwrap().len(), 2);
        assert_eq!(db.insert_episodes(id, &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_episode_for_unknown_podcast_rejected() {
        let (db, _) = db_with_podcast().await;
        let result = db
            .insert_episode(PodcastId(9999), &episode("x", "X", Utc::now()))
            .await;
        assert!(result.is_err());
    }
}

use std::future::Future;

use super::schema::Database;
use super::types::{DatabaseError, Episode, Podcast, PodcastId, SubscribedPodcast};

/// Persistence operations the repository needs.
///
/// Podcasts come back without episodes; callers load those separately with
/// [`load_episodes`](Self::load_episodes).
pub trait PodcastStore: Send + Sync {
    fn load_podcast(
        &self,
        feed_url: &str,
    ) -> impl Future<Output = Result<Option<SubscribedPodcast>, DatabaseError>> + Send;

    /// Newest first.
    fn load_episodes(
        &self,
        podcast_id: PodcastId,
    ) -> impl Future<Output = Result<Vec<Episode>, DatabaseError>> + Send;

    /// One-shot snapshot of all subscribed podcasts.
    fn load_podcasts_static(
        &self,
    ) -> impl Future<Output = Result<Vec<SubscribedPodcast>, DatabaseError>> + Send;

    /// Upsert keyed by feed URL.
    fn insert_podcast(
        &self,
        podcast: &Podcast,
    ) -> impl Future<Output = Result<PodcastId, DatabaseError>> + Send;

    /// Upsert keyed by `(podcast_id, guid)`.
    fn insert_episode(
        &self,
        podcast_id: PodcastId,
        episode: &Episode,
    ) -> impl Future<Output = Result<i64, DatabaseError>> + Send;

    /// All-or-nothing batch of [`insert_episode`](Self::insert_episode).
    fn insert_episodes(
        &self,
        podcast_id: PodcastId,
        episodes: &[Episode],
    ) -> impl Future<Output = Result<usize, DatabaseError>> + Send;

    /// Removes the podcast and all of its episodes.
    fn delete_podcast(
        &self,
        podcast_id: PodcastId,
    ) -> impl Future<Output = Result<(), DatabaseError>> + Send;
}

impl PodcastStore for Database {
    async fn load_podcast(&self, feed_url: &str) -> Result<Option<SubscribedPodcast>, DatabaseError> {
        Database::load_podcast(self, feed_url).await
    }

    async fn load_episodes(&self, podcast_id: PodcastId) -> Result<Vec<Episode>, DatabaseError> {
        Database::load_episodes(self, podcast_id).await
    }

    async fn load_podcasts_static(&self) -> Result<Vec<SubscribedPodcast>, DatabaseError> {
        Database::load_podcasts_static(self).await
    }

    async fn insert_podcast(&self, podcast: &Podcast) -> Result<PodcastId, DatabaseError> {
        Database::insert_podcast(self, podcast).await
    }

    async fn insert_episode(
        &self,
        podcast_id: PodcastId,
        episode: &Episode,
    ) -> Result<i64, DatabaseError> {
        Database::insert_episode(self, podcast_id, episode).await
    }

    async fn insert_episodes(
        &self,
        podcast_id: PodcastId,
        episodes: &[Episode],
    ) -> Result<usize, DatabaseError> {
        Database::insert_episodes(self, podcast_id, episodes).await
    }

    async fn delete_podcast(&self, podcast_id: PodcastId) -> Result<(), DatabaseError> {
        Database::delete_podcast(self, podcast_id).await
    }
}

//! Fetch, parse, reconcile and persist podcasts.
//!
//! [`PodcastRepository`] is the single entry point for the UI and the
//! background updater. Feed failures never escape it as errors: a
//! single-podcast lookup yields `None` and a batch update skips the feed.
//! Only store failures propagate.

mod convert;
mod reconcile;

pub use convert::{feed_to_podcast, rss_items_to_episodes};
pub use reconcile::new_episodes;

use thiserror::Error;

use crate::feed::{parse_feed, FeedFetcher, FetchError, ParseError};
use crate::storage::{
    Database, DatabaseError, Podcast, PodcastListWatcher, PodcastState, PodcastStore,
    SubscribedPodcast,
};

// ============================================================================
// Error Types
// ============================================================================

/// Why one podcast could not be refreshed.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to parse feed: {0}")]
    Parse(#[from] ParseError),

    /// The document parsed but never contained a channel
    #[error("Feed has no episode list")]
    MissingEpisodes,

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

// ============================================================================
// Update Results
// ============================================================================

/// A subscribed podcast that gained episodes during an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodcastUpdateInfo {
    pub feed_url: String,
    pub name: String,
    pub new_count: usize,
}

/// A subscribed podcast skipped during an update.
#[derive(Debug)]
pub struct UpdateFailure {
    pub feed_url: String,
    pub error: RefreshError,
}

/// Outcome of one batch update.
///
/// `updates` lists only podcasts with at least one new episode, in store
/// order. Podcasts with nothing new appear in neither list.
#[derive(Debug, Default)]
pub struct UpdateReport {
    pub updates: Vec<PodcastUpdateInfo>,
    pub failures: Vec<UpdateFailure>,
}

impl UpdateReport {
    pub fn total_new(&self) -> usize {
        self.updates.iter().map(|u| u.new_count).sum()
    }
}

// ============================================================================
// Repository
// ============================================================================

pub struct PodcastRepository<F, S> {
    fetcher: F,
    store: S,
}

impl<F: FeedFetcher, S: PodcastStore> PodcastRepository<F, S> {
    pub fn new(fetcher: F, store: S) -> Self {
        Self { fetcher, store }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Local-first lookup.
    ///
    /// A stored podcast is returned with its episodes and no network access.
    /// Otherwise the feed is fetched and returned as an unsaved preview;
    /// fetch or parse failures yield `Ok(None)`.
    pub async fn get_podcast(&self, feed_url: &str) -> Result<Option<PodcastState>, DatabaseError> {
        if let Some(mut subscribed) = self.store.load_podcast(feed_url).await? {
            subscribed.podcast.episodes = self.store.load_episodes(subscribed.id).await?;
            tracing::debug!(feed = %feed_url, "Serving podcast from store");
            return Ok(Some(PodcastState::Subscribed(subscribed)));
        }

        match self.fetch_podcast(feed_url, "").await {
            Ok(podcast) => Ok(Some(PodcastState::Preview(podcast))),
            Err(e) => {
                tracing::warn!(feed = %feed_url, error = %e, "Could not load feed");
                Ok(None)
            }
        }
    }

    /// Stores the podcast and all of its episodes under the assigned id.
    pub async fn save(&self, podcast: Podcast) -> Result<SubscribedPodcast, DatabaseError> {
        let id = self.store.insert_podcast(&podcast).await?;
        self.store.insert_episodes(id, &podcast.episodes).await?;
        tracing::info!(
            feed = %podcast.feed_url,
            podcast_id = %id,
            episodes = podcast.episodes.len(),
            "Subscribed to podcast"
        );
        Ok(SubscribedPodcast { id, podcast })
    }

    /// Removes the podcast; the store drops its episodes.
    pub async fn delete(&self, podcast: &SubscribedPodcast) -> Result<(), DatabaseError> {
        self.store.delete_podcast(podcast.id).await?;
        tracing::info!(feed = %podcast.podcast.feed_url, podcast_id = %podcast.id, "Unsubscribed");
        Ok(())
    }

    /// Refreshes every subscribed podcast, one at a time, in store order.
    ///
    /// A feed that fails is recorded in [`UpdateReport::failures`] and the
    /// batch carries on. Episodes persisted for earlier podcasts stay
    /// persisted if the batch is abandoned part-way.
    pub async fn update_podcast_episodes(&self) -> Result<UpdateReport, DatabaseError> {
        let podcasts = self.store.load_podcasts_static().await?;
        tracing::debug!(count = podcasts.len(), "Checking subscribed podcasts for new episodes");

        let mut report = UpdateReport::default();
        for subscribed in podcasts {
            let feed_url = &subscribed.podcast.feed_url;
            match self.add_new_episodes(&subscribed).await {
                Ok(0) => {}
                Ok(new_count) => {
                    tracing::info!(feed = %feed_url, new_count, "New episodes");
                    report.updates.push(PodcastUpdateInfo {
                        feed_url: feed_url.clone(),
                        name: subscribed.podcast.feed_title.clone(),
                        new_count,
                    });
                }
                Err(error) => {
                    tracing::warn!(feed = %feed_url, error = %error, "Skipping podcast");
                    report.failures.push(UpdateFailure {
                        feed_url: feed_url.clone(),
                        error,
                    });
                }
            }
        }
        Ok(report)
    }

    async fn fetch_podcast(&self, feed_url: &str, image_url: &str) -> Result<Podcast, RefreshError> {
        let bytes = self.fetcher.fetch(feed_url).await?;
        let document = parse_feed(&bytes)?;
        feed_to_podcast(feed_url, image_url, document).ok_or(RefreshError::MissingEpisodes)
    }

    async fn add_new_episodes(&self, subscribed: &SubscribedPodcast) -> Result<usize, RefreshError> {
        let local = &subscribed.podcast;
        let remote = self.fetch_podcast(&local.feed_url, &local.image_url).await?;
        let stored = self.store.load_episodes(subscribed.id).await?;

        let fresh = new_episodes(&remote.episodes, &stored);
        if fresh.is_empty() {
            return Ok(0);
        }
        Ok(self.store.insert_episodes(subscribed.id, &fresh).await?)
    }
}

impl<F: FeedFetcher> PodcastRepository<F, Database> {
    /// Live list of subscribed podcasts.
    pub fn get_all(&self) -> PodcastListWatcher {
        self.store.watch_podcasts()
    }
}

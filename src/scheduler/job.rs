use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;

use super::notify::{Notification, Notifier};
use crate::feed::FeedFetcher;
use crate::repository::{PodcastRepository, UpdateReport};
use crate::storage::PodcastStore;

/// Unique-work key under which the episode updater is registered.
pub const UPDATE_JOB_KEY: &str = "podsync-episode-update";

/// A unit of work the scheduling host can run repeatedly.
///
/// One call to `run` is one attempt; the host never runs two attempts of
/// the same registration at once.
pub trait PeriodicJob: Send + Sync + 'static {
    fn run(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Checks every subscription for new episodes and raises one notification
/// per podcast that gained any.
pub struct UpdateJob<F, S, N> {
    repository: Arc<PodcastRepository<F, S>>,
    notifier: N,
}

impl<F, S, N> UpdateJob<F, S, N>
where
    F: FeedFetcher,
    S: PodcastStore,
    N: Notifier,
{
    pub fn new(repository: Arc<PodcastRepository<F, S>>, notifier: N) -> Self {
        Self {
            repository,
            notifier,
        }
    }

    /// One update pass. Fails only if the subscription list cannot be read.
    pub async fn run_once(&self) -> Result<UpdateReport> {
        let report = self
            .repository
            .update_podcast_episodes()
            .await
            .context("Failed to update podcast episodes")?;

        for info in &report.updates {
            self.notifier.notify(Notification::new_episodes(info));
        }
        Ok(report)
    }
}

impl<F, S, N> PeriodicJob for UpdateJob<F, S, N>
where
    F: FeedFetcher + 'static,
    S: PodcastStore + 'static,
    N: Notifier + 'static,
{
    async fn run(&self) -> Result<()> {
        let report = self.run_once().await?;
        tracing::info!(
            updated = report.updates.len(),
            new_episodes = report.total_new(),
            failed = report.failures.len(),
            "Episode update finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FetchError;
    use crate::scheduler::ChannelNotifier;
    use crate::storage::{Database, Podcast};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    const FEED: &str = r#"<rss><channel><title>Show</title>
        <item><guid>1</guid><title>One</title></item>
        <item><guid>2</guid><title>Two</title></item>
    </channel></rss>"#;

    struct StaticFetcher;

    impl FeedFetcher for StaticFetcher {
        async fn fetch(&self, _feed_url: &str) -> Result<Vec<u8>, FetchError> {
            Ok(FEED.as_bytes().to_vec())
        }
    }

    #[tokio::test]
    async fn test_notifies_once_per_updated_podcast() {
        let db = Database::open(":memory:").await.unwrap();
        let repository = Arc::new(PodcastRepository::new(StaticFetcher, db));
        repository
            .save(Podcast {
                feed_url: "https://example.com/feed".into(),
                feed_title: "Show".into(),
                feed_desc: String::new(),
                image_url: String::new(),
                last_updated: Utc::now(),
                episodes: Vec::new(),
            })
            .await
            .unwrap();

        let (notifier, mut rx) = ChannelNotifier::new();
        let job = UpdateJob::new(repository, notifier);

        let report = job.run_once().await.unwrap();
        assert_eq!(report.total_new(), 2);

        let notification = rx.try_recv().unwrap();
        assert_eq!(notification.dedupe_key, "Show");
        assert_eq!(notification.deep_link, "https://example.com/feed");
        assert_eq!(notification.body, "2 new episodes for Show");
        assert!(rx.try_recv().is_err());

        // Nothing new the second time, so nothing to announce
        job.run().await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}

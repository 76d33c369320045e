//! Podcast persistence: the [`PodcastStore`] seam and its SQLite engine.

mod episodes;
mod podcasts;
mod schema;
mod store;
mod types;

pub use podcasts::PodcastListWatcher;
pub use schema::Database;
pub use store::PodcastStore;
pub use types::{
    DatabaseError, Episode, Podcast, PodcastId, PodcastState, PodcastSummary, SubscribedPodcast,
};

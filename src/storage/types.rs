use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::feed::short_date;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of podsync appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Domain Types
// ============================================================================

/// Store-assigned identity of a subscribed podcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PodcastId(pub i64);

impl fmt::Display for PodcastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One podcast episode.
///
/// Episodes carry no owner in memory: the store stamps the owning podcast
/// when the episode is inserted. `guid` is unique per podcast, not globally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Episode {
    pub guid: String,
    pub title: String,
    pub description: String,
    pub media_url: String,
    pub mime_type: String,
    pub release_date: DateTime<Utc>,
    pub duration: String,
}

impl Episode {
    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video")
    }
}

/// A podcast and its episodes, independent of whether it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Podcast {
    /// Natural key, used to find a local copy before fetching
    pub feed_url: String,
    pub feed_title: String,
    pub feed_desc: String,
    pub image_url: String,
    pub last_updated: DateTime<Utc>,
    /// Loaded separately from the podcast row
    pub episodes: Vec<Episode>,
}

/// A podcast that exists in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribedPodcast {
    pub id: PodcastId,
    #[serde(flatten)]
    pub podcast: Podcast,
}

/// Whether a podcast is a fetched-but-unsaved preview or a stored subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodcastState {
    Preview(Podcast),
    Subscribed(SubscribedPodcast),
}

impl PodcastState {
    pub fn is_subscribed(&self) -> bool {
        matches!(self, PodcastState::Subscribed(_))
    }

    pub fn id(&self) -> Option<PodcastId> {
        match self {
            PodcastState::Preview(_) => None,
            PodcastState::Subscribed(s) => Some(s.id),
        }
    }

    pub fn podcast(&self) -> &Podcast {
        match self {
            PodcastState::Preview(p) => p,
            PodcastState::Subscribed(s) => &s.podcast,
        }
    }

    pub fn into_podcast(self) -> Podcast {
        match self {
            PodcastState::Preview(p) => p,
            PodcastState::Subscribed(s) => s.podcast,
        }
    }
}

/// Compact listing row for subscribed podcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodcastSummary {
    pub feed_title: String,
    pub feed_url: String,
    pub image_url: String,
    /// `YYYY-MM-DD`
    pub last_updated: String,
}

impl From<&Podcast> for PodcastSummary {
    fn from(podcast: &Podcast) -> Self {
        Self {
            feed_title: podcast.feed_title.clone(),
            feed_url: podcast.feed_url.clone(),
            image_url: podcast.image_url.clone(),
            last_updated: short_date(&podcast.last_updated),
        }
    }
}

// ============================================================================
// Row Types
// ============================================================================

/// Internal row type for podcast queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PodcastRow {
    pub id: i64,
    pub feed_url: String,
    pub feed_title: String,
    pub feed_desc: String,
    pub image_url: String,
    pub last_updated: i64,
}

impl PodcastRow {
    /// Episodes are left empty; they are loaded with `load_episodes`.
    pub(crate) fn into_subscribed(self) -> SubscribedPodcast {
        SubscribedPodcast {
            id: PodcastId(self.id),
            podcast: Podcast {
                feed_url: self.feed_url,
                feed_title: self.feed_title,
                feed_desc: self.feed_desc,
                image_url: self.image_url,
                last_updated: from_timestamp(self.last_updated),
                episodes: Vec::new(),
            },
        }
    }
}

/// Internal row type for episode queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EpisodeRow {
    pub guid: String,
    pub title: String,
    pub description: String,
    pub media_url: String,
    pub mime_type: String,
    pub release_date: i64,
    pub duration: String,
}

impl EpisodeRow {
    pub(crate) fn into_episode(self) -> Episode {
        Episode {
            guid: self.guid,
            title: self.title,
            description: self.description,
            media_url: self.media_url,
            mime_type: self.mime_type,
            release_date: from_timestamp(self.release_date),
            duration: self.duration,
        }
    }
}

/// Timestamps are stored as Unix seconds.
fn from_timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

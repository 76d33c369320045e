use chrono::{DateTime, Utc};

/// A podcast feed as parsed from RSS XML, before conversion to a [`Podcast`].
///
/// Produced once per fetch and discarded after conversion.
///
/// [`Podcast`]: crate::storage::Podcast
#[derive(Debug, Clone, PartialEq)]
pub struct FeedDocument {
    pub title: String,
    pub description: String,
    /// `itunes:summary`, used when `description` is empty
    pub summary: String,
    /// From the last channel-level `pubDate` seen; "now" when absent or unparseable
    pub last_updated: DateTime<Utc>,
    /// `Some` once a `<channel>` element was opened, in document order.
    /// `None` means the document never described a channel at all.
    pub episodes: Option<Vec<EpisodeResponse>>,
}

impl Default for FeedDocument {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            summary: String::new(),
            last_updated: Utc::now(),
            episodes: None,
        }
    }
}

/// Raw fields of one `<item>`; every field is optional until conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeResponse {
    pub guid: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Raw `pubDate` text, parsed during conversion
    pub pub_date: Option<String>,
    /// `itunes:duration`
    pub duration: Option<String>,
    pub link: Option<String>,
    /// `url` attribute of `<enclosure>`
    pub media_url: Option<String>,
    /// `type` attribute of `<enclosure>`
    pub mime_type: Option<String>,
}

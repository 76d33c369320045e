//! Mapping from parsed feed documents to domain podcasts.

use crate::feed::{xml_date_to_date, EpisodeResponse, FeedDocument};
use crate::storage::{Episode, Podcast};

/// Builds a podcast from a parsed feed.
///
/// Returns `None` when the document never had an episode list. The
/// description falls back to `itunes:summary` when empty.
pub fn feed_to_podcast(feed_url: &str, image_url: &str, document: FeedDocument) -> Option<Podcast> {
    let items = document.episodes?;
    let feed_desc = if document.description.is_empty() {
        document.summary
    } else {
        document.description
    };

    Some(Podcast {
        feed_url: feed_url.to_string(),
        feed_title: document.title,
        feed_desc,
        image_url: image_url.to_string(),
        last_updated: document.last_updated,
        episodes: rss_items_to_episodes(items),
    })
}

/// Missing text fields become `""`; a missing or bad `pubDate` becomes now.
pub fn rss_items_to_episodes(items: Vec<EpisodeResponse>) -> Vec<Episode> {
    items
        .into_iter()
        .map(|item| Episode {
            release_date: xml_date_to_date(item.pub_date.as_deref()),
            guid: item.guid.unwrap_or_default(),
            title: item.title.unwrap_or_default(),
            description: item.description.unwrap_or_default(),
            media_url: item.media_url.unwrap_or_default(),
            mime_type: item.mime_type.unwrap_or_default(),
            duration: item.duration.unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn document(description: &str, summary: &str) -> FeedDocument {
        FeedDocument {
            title: "Show".into(),
            description: description.into(),
            summary: summary.into(),
            last_updated: Utc.with_ymd_and_hms(2024, 3, 4, 5, 6, 7).unwrap(),
            episodes: Some(Vec::new()),
        }
    }

    #[test]
    fn test_empty_description_falls_back_to_summary() {
        let podcast = feed_to_podcast("https://x/feed", "", document("", "X")).unwrap();
        assert_eq!(podcast.feed_desc, "X");
    }

    #[test]
    fn test_description_preferred_over_summary() {
        let podcast = feed_to_podcast("https://x/feed", "", document("D", "X")).unwrap();
        assert_eq!(podcast.feed_desc, "D");
    }

    #[test]
    fn test_channel_fields_and_image_carried() {
        let podcast =
            feed_to_podcast("https://x/feed", "https://x/art.png", document("D", "")).unwrap();
        assert_eq!(podcast.feed_url, "https://x/feed");
        assert_eq!(podcast.feed_title, "Show");
        assert_eq!(podcast.image_url, "https://x/art.png");
        assert_eq!(
            podcast.last_updated,
            Utc.with_ymd_and_hms(2024, 3, 4, 5, 6, 7).unwrap()
        );
        assert!(podcast.episodes.is_empty());
    }

    #[test]
    fn test_missing_episode_list_fails_conversion() {
        let doc = FeedDocument {
            episodes: None,
            ..document("D", "")
        };
        assert!(feed_to_podcast("https://x/feed", "", doc).is_none());
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let episodes = rss_items_to_episodes(vec![EpisodeResponse::default()]);
        let episode = &episodes[0];
        assert_eq!(episode.guid, "");
        assert_eq!(episode.title, "");
        assert_eq!(episode.media_url, "");
        assert_eq!(episode.mime_type, "");
        assert_eq!(episode.duration, "");
        assert!((Utc::now() - episode.release_date).abs() < Duration::seconds(5));
    }

    #[test]
    fn test_item_fields_mapped() {
        let item = EpisodeResponse {
            guid: Some("g1".into()),
            title: Some("Pilot".into()),
            description: Some("First".into()),
            pub_date: Some("Tue, 10 Jun 2003 04:00:00 GMT".into()),
            duration: Some("42:00".into()),
            link: Some("https://x/ep1".into()),
            media_url: Some("https://x/ep1.mp4".into()),
            mime_type: Some("video/mp4".into()),
        };
        let episode = rss_items_to_episodes(vec![item]).remove(0);
        assert_eq!(episode.guid, "g1");
        assert_eq!(episode.title, "Pilot");
        assert_eq!(episode.description, "First");
        assert_eq!(episode.duration, "42:00");
        assert_eq!(episode.media_url, "https://x/ep1.mp4");
        assert_eq!(
            episode.release_date,
            Utc.with_ymd_and_hms(2003, 6, 10, 4, 0, 0).unwrap()
        );
        assert!(episode.is_video());
    }
}

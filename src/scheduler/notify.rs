use serde::Serialize;
use tokio::sync::mpsc;

use crate::repository::PodcastUpdateInfo;

/// A user-visible alert about new episodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// A later notification with the same key replaces the earlier one
    pub dedupe_key: String,
    /// Feed URL of the podcast to open when the alert is activated
    pub deep_link: String,
}

impl Notification {
    pub const TITLE: &'static str = "New episodes";

    pub fn new_episodes(info: &PodcastUpdateInfo) -> Self {
        let noun = if info.new_count == 1 { "episode" } else { "episodes" };
        Self {
            title: Self::TITLE.to_string(),
            body: format!("{} new {noun} for {}", info.new_count, info.name),
            dedupe_key: info.name.clone(),
            deep_link: info.feed_url.clone(),
        }
    }
}

/// Sink for [`Notification`]s.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        tracing::info!(
            key = %notification.dedupe_key,
            feed = %notification.deep_link,
            "{}: {}",
            notification.title,
            notification.body
        );
    }
}

/// Forwards notifications to a receiver owned by the UI or CLI.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if let Err(e) = self.tx.send(notification) {
            tracing::debug!(key = %e.0.dedupe_key, "Notification receiver gone, dropping");
        }
    }
}

//! Podcast feed retrieval and parsing.
//!
//! - **Fetching**: a single HTTP GET per feed, bounded by timeouts and a body
//!   size cap ([`HttpFeedFetcher`])
//! - **Parsing**: a streaming pass over RSS 2.0 with `itunes:` extensions,
//!   producing channel metadata plus episodes in document order
//!   ([`parse_feed`])
//!
//! Both stages fail with their own error types; neither retries.
//!
//! # Example
//!
//! ```ignore
//! use podsync::feed::{parse_feed, FeedFetcher, HttpFeedFetcher};
//!
//! let fetcher = HttpFeedFetcher::new(&config.http)?;
//! let bytes = fetcher.fetch("https://example.com/feed.xml").await?;
//! let document = parse_feed(&bytes)?;
//! ```

mod date;
mod fetcher;
mod parser;
mod types;

pub use date::{short_date, xml_date_to_date};
pub use fetcher::{FeedFetcher, FetchError, HttpFeedFetcher};
pub use parser::{parse_feed, ParseError};
pub use types::{EpisodeResponse, FeedDocument};

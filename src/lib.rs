//! Podcast feed synchronization.
//!
//! Fetches RSS podcast feeds, parses them into episodes, works out which
//! episodes are new against a local SQLite store, and keeps subscriptions
//! current with a periodic background job.

pub mod config;
pub mod feed;
pub mod repository;
pub mod scheduler;
pub mod storage;

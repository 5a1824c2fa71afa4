//! Domain models shared by the fetcher, ingester and repositories

pub mod episode;
pub mod feed;

pub use episode::{Episode, NewEpisode};
pub use feed::{Feed, FeedEntry};

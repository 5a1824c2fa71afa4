//! Feed sources
//!
//! [`FeedSource`] is the seam between the scheduler and the network: the
//! production implementation is [`RssFeedSource`], tests substitute their own.

pub mod rss;
pub mod traits;

pub use rss::RssFeedSource;
pub use traits::FeedSource;

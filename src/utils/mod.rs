//! Shared utilities: HTTP retrieval, feed parsing, date handling

pub mod datetime;
pub mod decompression;
pub mod feed_parser;
pub mod http_client;
pub mod url;

pub use datetime::{DateTimeError, DateTimeParser};
pub use decompression::{CompressionFormat, DecompressionService};
pub use feed_parser::parse_feed;
pub use http_client::StandardHttpClient;

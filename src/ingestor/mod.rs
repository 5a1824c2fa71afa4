//! Episode ingestion: turn parsed feeds into stored episodes exactly once

pub mod ingest_episodes;

pub use ingest_episodes::{EntryFailure, EpisodeIngester, IngestResult};

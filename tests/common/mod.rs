//! Shared helpers for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use opentelemetry::global;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use podcast_ingest::{
    config::DatabaseConfig,
    database::{
        Database,
        repositories::{EpisodeSeaOrmRepository, JobStoreSeaOrmRepository},
    },
    errors::{SourceError, SourceResult},
    ingestor::EpisodeIngester,
    job_scheduling::{ExecutionLogPruner, JobExecutor, SchedulerEngine, SchedulerSettings},
    models::{Feed, FeedEntry},
    observability::AppObservability,
    sources::FeedSource,
};

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

/// Migrated in-memory SQLite database
pub async fn create_test_database() -> Database {
    let database = Database::new(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: Some(1),
    })
    .await
    .expect("Failed to create test database");
    database.migrate().await.expect("Failed to run migrations");
    database
}

/// Migrated SQLite database backed by a file, for restart scenarios
pub async fn open_file_database(path: &std::path::Path) -> Database {
    let database = Database::new(&DatabaseConfig {
        url: format!("sqlite://{}", path.display()),
        max_connections: Some(4),
    })
    .await
    .expect("Failed to open file database");
    database.migrate().await.expect("Failed to run migrations");
    database
}

pub fn test_observability() -> AppObservability {
    AppObservability::from_meter(global::meter("podcast-ingest-test"))
}

pub fn test_settings() -> SchedulerSettings {
    SchedulerSettings {
        timezone: chrono_tz::UTC,
        poll_interval: Duration::from_millis(20),
        shutdown_grace_period: Duration::from_secs(5),
        run_missed_immediately: true,
    }
}

pub fn entry(guid: &str, title: &str, published: &str) -> FeedEntry {
    FeedEntry::new(guid)
        .with_title(title)
        .with_published(published)
}

pub fn feed(title: &str, entries: Vec<FeedEntry>) -> Feed {
    Feed {
        title: title.to_string(),
        image: Some(format!("https://img.example.com/{}.png", title.to_lowercase())),
        entries,
    }
}

/// Feed source that serves canned feeds and records how it was called
#[derive(Default)]
pub struct MockFeedSource {
    feeds: Mutex<HashMap<String, Feed>>,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockFeedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn serve(&self, url: &str, feed: Feed) {
        self.feeds.lock().unwrap().insert(url.to_string(), feed);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for MockFeedSource {
    async fn fetch(&self, url: &str) -> SourceResult<Feed> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = self
            .feeds
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| SourceError::network(url, "connection refused"));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Everything a scheduler test needs, wired on one database
pub struct TestHarness {
    pub database: Database,
    pub job_store: JobStoreSeaOrmRepository,
    pub episodes: EpisodeSeaOrmRepository,
    pub source: Arc<MockFeedSource>,
}

impl TestHarness {
    pub async fn new(source: MockFeedSource) -> Self {
        Self::with_database(create_test_database().await, source)
    }

    pub fn with_database(database: Database, source: MockFeedSource) -> Self {
        let connection = database.connection().clone();
        Self {
            job_store: JobStoreSeaOrmRepository::new(connection.clone()),
            episodes: EpisodeSeaOrmRepository::new(connection),
            database,
            source: Arc::new(source),
        }
    }

    pub fn executor(&self) -> JobExecutor {
        JobExecutor::new(
            self.source.clone(),
            EpisodeIngester::new(self.episodes.clone(), chrono_tz::UTC),
            ExecutionLogPruner::new(self.job_store.clone()),
            test_observability(),
        )
    }

    pub fn engine(&self, settings: SchedulerSettings) -> SchedulerEngine {
        SchedulerEngine::new(
            self.job_store.clone(),
            self.executor(),
            test_observability(),
            settings,
        )
    }
}

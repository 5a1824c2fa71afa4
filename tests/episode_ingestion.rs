//! Integration tests for episode ingestion against a real SQLite store

mod common;

use chrono::{TimeZone, Utc};
use common::{create_test_database, entry, feed, open_file_database, utc};
use tempfile::TempDir;
use podcast_ingest::{
    database::repositories::EpisodeSeaOrmRepository,
    errors::EntryError,
    ingestor::EpisodeIngester,
    models::{FeedEntry, NewEpisode},
};

async fn create_ingester() -> (EpisodeIngester, EpisodeSeaOrmRepository) {
    let database = create_test_database().await;
    let episodes = EpisodeSeaOrmRepository::new(database.connection().clone());
    (
        EpisodeIngester::new(episodes.clone(), chrono_tz::UTC),
        episodes,
    )
}

async fn stored_guids(episodes: &EpisodeSeaOrmRepository) -> Vec<String> {
    let mut guids: Vec<String> = episodes
        .find_all()
        .await
        .unwrap()
        .into_iter()
        .map(|episode| episode.guid)
        .collect();
    guids.sort();
    guids
}

#[tokio::test]
async fn test_ingestion_adds_new_entries_once() {
    let (ingester, episodes) = create_ingester().await;

    let mut first_a = entry("A", "Episode A", "Mon, 05 Oct 2026 10:00:00 +0000");
    first_a.link = "https://example.com/a".to_string();
    let mut first_b = entry("B", "Episode B", "Tue, 06 Oct 2026 10:00:00 +0000");
    first_b.link = "https://example.com/b".to_string();
    let initial = feed("Talk Show", vec![first_a, first_b.clone()]);

    let result = ingester.ingest(&initial).await.unwrap();
    assert_eq!((result.added, result.skipped), (2, 0));
    assert!(result.failed.is_empty());

    let stored = episodes.find_by_guid("A").await.unwrap().unwrap();
    assert_eq!(stored.title, "Episode A");
    assert_eq!(stored.link, "https://example.com/a");
    assert_eq!(stored.podcast_name, "Talk Show");
    assert_eq!(stored.image, "https://img.example.com/talk show.png");
    assert_eq!(stored.pub_date, utc(2026, 10, 5, 10, 0, 0));

    // Identical payload stores nothing new
    let result = ingester.ingest(&initial).await.unwrap();
    assert_eq!((result.added, result.skipped), (0, 2));
    assert_eq!(episodes.count().await.unwrap(), 2);

    // B drops out of the feed, C appears
    let next = feed(
        "Talk Show",
        vec![
            entry("A", "Episode A", "Mon, 05 Oct 2026 10:00:00 +0000"),
            entry("C", "Episode C", "Wed, 07 Oct 2026 10:00:00 +0000"),
        ],
    );
    let result = ingester.ingest(&next).await.unwrap();
    assert_eq!((result.added, result.skipped), (1, 1));
    assert_eq!(stored_guids(&episodes).await, vec!["A", "B", "C"]);

    assert_eq!(result.summary(), "added=1 skipped=1 failed=0");
}

#[tokio::test]
async fn test_unparsable_date_skips_only_that_entry() {
    let (ingester, episodes) = create_ingester().await;

    let payload = feed(
        "Daily",
        vec![
            entry("good-1", "Good one", "2026-10-05T08:00:00Z"),
            entry("bad", "Bad date", "sometime last week"),
            entry("good-2", "Good two", "Tue, 06 Oct 2026 08:00:00 GMT"),
        ],
    );

    let result = ingester.ingest(&payload).await.unwrap();
    assert_eq!(result.added, 2);
    assert_eq!(result.failed.len(), 1);

    let failure = &result.failed[0];
    assert_eq!(failure.guid.as_deref(), Some("bad"));
    assert!(matches!(failure.error, EntryError::InvalidPubDate { .. }));
    assert_eq!(stored_guids(&episodes).await, vec!["good-1", "good-2"]);

    // A later fix to the date lets the entry in
    let fixed = feed(
        "Daily",
        vec![entry("bad", "Bad date", "Sun, 04 Oct 2026 08:00:00 +0000")],
    );
    let result = ingester.ingest(&fixed).await.unwrap();
    assert_eq!(result.added, 1);
}

#[tokio::test]
async fn test_entries_without_guid_or_date_are_reported() {
    let (ingester, episodes) = create_ingester().await;

    let payload = feed(
        "Sparse",
        vec![
            FeedEntry {
                guid: None,
                title: "No identity".to_string(),
                published_at_raw: Some("2026-10-05T08:00:00Z".to_string()),
                ..Default::default()
            },
            FeedEntry::new("undated").with_title("No date"),
            entry("fine", "Fine", "2026-10-05T08:00:00Z"),
        ],
    );

    let result = ingester.ingest(&payload).await.unwrap();
    assert_eq!(result.added, 1);
    assert_eq!(result.failed.len(), 2);
    assert!(matches!(result.failed[0].error, EntryError::MissingGuid));
    assert!(matches!(
        result.failed[1].error,
        EntryError::MissingPubDate { .. }
    ));
    assert_eq!(episodes.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_duplicate_guid_within_one_feed_is_stored_once() {
    let (ingester, episodes) = create_ingester().await;

    let payload = feed(
        "Repeats",
        vec![
            entry("same", "First copy", "2026-10-05T08:00:00Z"),
            entry("same", "Second copy", "2026-10-06T08:00:00Z"),
        ],
    );

    let result = ingester.ingest(&payload).await.unwrap();
    assert_eq!((result.added, result.skipped), (1, 1));

    let stored = episodes.find_by_guid("same").await.unwrap().unwrap();
    assert_eq!(stored.title, "First copy");
}

#[tokio::test]
async fn test_offsetless_dates_use_ingester_timezone() {
    let database = create_test_database().await;
    let episodes = EpisodeSeaOrmRepository::new(database.connection().clone());
    let ingester = EpisodeIngester::new(episodes.clone(), chrono_tz::Europe::Berlin);

    let payload = feed(
        "Local",
        vec![entry("local", "Local time", "2026-07-01 12:00:00")],
    );
    ingester.ingest(&payload).await.unwrap();

    let stored = episodes.find_by_guid("local").await.unwrap().unwrap();
    assert_eq!(stored.pub_date, utc(2026, 7, 1, 10, 0, 0));
}

#[tokio::test]
async fn test_repository_rejects_duplicate_guid() {
    let database = create_test_database().await;
    let episodes = EpisodeSeaOrmRepository::new(database.connection().clone());

    let episode = NewEpisode {
        guid: "unique".to_string(),
        title: "Once".to_string(),
        description: String::new(),
        link: "https://example.com/once".to_string(),
        image: String::new(),
        podcast_name: "Show".to_string(),
        pub_date: Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap(),
    };

    episodes.create(episode.clone(), Utc::now()).await.unwrap();
    let error = episodes.create(episode, Utc::now()).await.unwrap_err();
    assert!(error.is_unique_violation());
    assert_eq!(episodes.count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_ingestion_of_same_feed_stores_each_episode_once() {
    let temp_dir = TempDir::new().unwrap();
    let database = open_file_database(&temp_dir.path().join("episodes.db")).await;
    let episodes = EpisodeSeaOrmRepository::new(database.connection().clone());

    let entries: Vec<FeedEntry> = (0..50)
        .map(|i| {
            entry(
                &format!("ep-{i:02}"),
                &format!("Episode {i}"),
                "Mon, 05 Oct 2026 10:00:00 +0000",
            )
        })
        .collect();
    let document = feed("Race Show", entries);

    let first = EpisodeIngester::new(episodes.clone(), chrono_tz::UTC);
    let second = EpisodeIngester::new(episodes.clone(), chrono_tz::UTC);
    let (a, b) = tokio::join!(first.ingest(&document), second.ingest(&document));
    let (a, b) = (a.unwrap(), b.unwrap());

    // Losing an insert race to the other ingester is a skip, not a failure
    assert!(a.failed.is_empty(), "unexpected failures: {:?}", a.failed);
    assert!(b.failed.is_empty(), "unexpected failures: {:?}", b.failed);
    assert_eq!(a.added + b.added, 50);
    assert_eq!(a.added + a.skipped, 50);
    assert_eq!(b.added + b.skipped, 50);
    assert_eq!(episodes.count().await.unwrap(), 50);
}

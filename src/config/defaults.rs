/// Configuration default values
///
/// All default values for configuration options live here so they can be
/// changed in one place.
// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./podcast-ingest.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

// Scheduler defaults
pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const DEFAULT_POLL_INTERVAL: &str = "1s";
pub const DEFAULT_SHUTDOWN_GRACE_PERIOD: &str = "10s";
pub const DEFAULT_RUN_MISSED_IMMEDIATELY: bool = true;

// Fetch defaults
pub const DEFAULT_FETCH_TIMEOUT: &str = "30s";
pub const DEFAULT_FETCH_CONNECT_TIMEOUT: &str = "10s";
pub const DEFAULT_USER_AGENT: &str = concat!("podcast-ingest/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_MAX_BODY_SIZE: usize = 20 * 1024 * 1024; // 20MB

// Feed task defaults
pub const DEFAULT_FEED_INTERVAL: &str = "2m";
pub const DEFAULT_MAX_INSTANCES: u32 = 1;

/// Feeds polled out of the box: (job id, source url)
pub const DEFAULT_FEEDS: &[(&str, &str)] = &[
    (
        "Brain dump diaries",
        "https://media.rss.com/braindumpdiaries/feed.xml",
    ),
    (
        "Its complicated",
        "https://media.rss.com/itscomplicated/feed.xml",
    ),
    (
        "Green sky social network",
        "https://media.rss.com/greenskysocialwork/feed.xml",
    ),
    (
        "The fresh slate podcast",
        "https://media.rss.com/thefreshslatepodcast/feed.xml",
    ),
    (
        "mind the health gap",
        "https://media.rss.com/mindthehealthgap/feed.xml",
    ),
];

// Retention defaults
pub const DEFAULT_RETENTION_JOB_ID: &str = "Delete Old Job Executions";
pub const DEFAULT_RETENTION_MAX_AGE: &str = "7d";
pub const DEFAULT_RETENTION_DAY_OF_WEEK: &str = "mon";
pub const DEFAULT_RETENTION_HOUR: &str = "00";
pub const DEFAULT_RETENTION_MINUTE: &str = "00";

// Environment variable overrides
pub const ENV_PREFIX: &str = "PODCAST_INGEST_";

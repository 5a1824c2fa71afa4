use chrono_tz::Tz;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use crate::errors::{AppError, AppResult};
use crate::job_scheduling::{CompiledTrigger, JobDefinition, JobWork, Trigger};
use crate::utils::url::UrlUtils;
use defaults::*;
use duration_serde::duration;

/// Top-level configuration, loaded from TOML with environment overrides
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub fetch: FetchConfig,
    pub retention: RetentionConfig,
    /// Feed polling tasks
    pub feeds: Vec<FeedConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// IANA timezone name used for cron triggers and naive feed dates
    pub timezone: String,
    /// How often the control loop evaluates due jobs
    #[serde(with = "duration")]
    pub poll_interval: Duration,
    /// How long shutdown waits for in-flight executions
    #[serde(with = "duration")]
    pub shutdown_grace_period: Duration,
    /// Fire once on startup for jobs whose persisted next run is already past
    pub run_missed_immediately: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    #[serde(with = "duration")]
    pub timeout: Duration,
    #[serde(with = "duration")]
    pub connect_timeout: Duration,
    pub user_agent: String,
    /// Maximum accepted response body in bytes
    pub max_body_size: usize,
}

/// Execution history pruning job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetentionConfig {
    pub job_id: String,
    #[serde(with = "duration")]
    pub max_age: Duration,
    pub day_of_week: String,
    pub hour: String,
    pub minute: String,
}

/// One polled feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    /// Job id; stable across restarts
    pub id: String,
    pub url: String,
    #[serde(with = "duration", default = "default_feed_interval")]
    pub interval: Duration,
    #[serde(default = "default_max_instances")]
    pub max_instances: u32,
}

fn parse_default_duration(value: &str) -> Duration {
    humantime::parse_duration(value).unwrap_or_default()
}

fn default_feed_interval() -> Duration {
    parse_default_duration(DEFAULT_FEED_INTERVAL)
}

fn default_max_instances() -> u32 {
    DEFAULT_MAX_INSTANCES
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: Some(DEFAULT_MAX_CONNECTIONS),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            poll_interval: parse_default_duration(DEFAULT_POLL_INTERVAL),
            shutdown_grace_period: parse_default_duration(DEFAULT_SHUTDOWN_GRACE_PERIOD),
            run_missed_immediately: DEFAULT_RUN_MISSED_IMMEDIATELY,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: parse_default_duration(DEFAULT_FETCH_TIMEOUT),
            connect_timeout: parse_default_duration(DEFAULT_FETCH_CONNECT_TIMEOUT),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            job_id: DEFAULT_RETENTION_JOB_ID.to_string(),
            max_age: parse_default_duration(DEFAULT_RETENTION_MAX_AGE),
            day_of_week: DEFAULT_RETENTION_DAY_OF_WEEK.to_string(),
            hour: DEFAULT_RETENTION_HOUR.to_string(),
            minute: DEFAULT_RETENTION_MINUTE.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            scheduler: SchedulerConfig::default(),
            fetch: FetchConfig::default(),
            retention: RetentionConfig::default(),
            feeds: DEFAULT_FEEDS
                .iter()
                .map(|(id, url)| FeedConfig {
                    id: (*id).to_string(),
                    url: (*url).to_string(),
                    interval: default_feed_interval(),
                    max_instances: DEFAULT_MAX_INSTANCES,
                })
                .collect(),
        }
    }
}

impl SchedulerConfig {
    /// Parsed scheduler timezone
    pub fn tz(&self) -> AppResult<Tz> {
        self.timezone.trim().parse::<Tz>().map_err(|e| {
            AppError::configuration(format!(
                "scheduler.timezone: unknown timezone '{}': {e}",
                self.timezone
            ))
        })
    }
}

impl RetentionConfig {
    pub fn trigger(&self) -> Trigger {
        Trigger::cron(&self.day_of_week, &self.hour, &self.minute)
    }
}

impl Config {
    /// Load configuration from `config_file`, writing the defaults there first
    /// when it does not exist. `PODCAST_INGEST_*` environment variables
    /// override file values (`__` separates nested keys).
    pub fn load_from_file<P: AsRef<Path>>(config_file: P) -> AppResult<Self> {
        let path = config_file.as_ref();
        if !path.exists() {
            let contents = toml::to_string_pretty(&Self::default()).map_err(|e| {
                AppError::configuration(format!("Failed to render default config: {e}"))
            })?;
            std::fs::write(path, contents).map_err(|e| {
                AppError::configuration(format!(
                    "Failed to write default config to {}: {e}",
                    path.display()
                ))
            })?;
            info!("Created default config file: {}", path.display());
        }

        Self::figment(path).extract().map_err(|e| {
            AppError::configuration(format!("Failed to load {}: {e}", path.display()))
        })
    }

    /// Provider chain: defaults, then the TOML file, then the environment
    pub fn figment(config_file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Check every invariant the scheduler relies on; the message names the offending key
    pub fn validate(&self) -> AppResult<()> {
        if self.database.url.trim().is_empty() {
            return Err(AppError::configuration("database.url must not be empty"));
        }
        if self.database.max_connections == Some(0) {
            return Err(AppError::configuration(
                "database.max_connections must be at least 1",
            ));
        }

        self.scheduler.tz()?;
        if self.scheduler.poll_interval.is_zero() {
            return Err(AppError::configuration(
                "scheduler.poll_interval must be greater than zero",
            ));
        }

        if self.fetch.timeout.is_zero() {
            return Err(AppError::configuration(
                "fetch.timeout must be greater than zero",
            ));
        }
        if self.fetch.max_body_size == 0 {
            return Err(AppError::configuration(
                "fetch.max_body_size must be greater than zero",
            ));
        }

        if self.retention.job_id.trim().is_empty() {
            return Err(AppError::configuration("retention.job_id must not be empty"));
        }
        if self.retention.max_age.is_zero() {
            return Err(AppError::configuration(
                "retention.max_age must be greater than zero",
            ));
        }
        CompiledTrigger::compile(&self.retention.job_id, &self.retention.trigger()).map_err(
            |e| AppError::configuration(format!("retention: {e}")),
        )?;

        let mut seen = HashSet::new();
        seen.insert(self.retention.job_id.as_str());
        for (index, feed) in self.feeds.iter().enumerate() {
            if feed.id.trim().is_empty() {
                return Err(AppError::configuration(format!(
                    "feeds[{index}].id must not be empty"
                )));
            }
            if !seen.insert(feed.id.as_str()) {
                return Err(AppError::configuration(format!(
                    "feeds[{index}].id: duplicate job id '{}'",
                    feed.id
                )));
            }
            UrlUtils::validate_feed_url(&feed.url).map_err(|e| {
                AppError::configuration(format!("feeds[{index}].url: {e}"))
            })?;
            if feed.max_instances == 0 {
                return Err(AppError::configuration(format!(
                    "feeds[{index}].max_instances must be at least 1"
                )));
            }
            CompiledTrigger::compile(&feed.id, &Trigger::every(feed.interval)).map_err(|e| {
                AppError::configuration(format!("feeds[{index}].interval: {e}"))
            })?;
        }

        Ok(())
    }

    /// The statically declared task set, registered with replace-existing semantics
    pub fn job_definitions(&self) -> Vec<JobDefinition> {
        let mut definitions: Vec<JobDefinition> = self
            .feeds
            .iter()
            .map(|feed| {
                JobDefinition::new(
                    feed.id.clone(),
                    Trigger::every(feed.interval),
                    JobWork::FetchAndIngest {
                        source_url: feed.url.clone(),
                    },
                )
                .with_max_instances(feed.max_instances)
            })
            .collect();

        definitions.push(JobDefinition::new(
            self.retention.job_id.clone(),
            self.retention.trigger(),
            JobWork::PruneExecutions {
                max_age: self.retention.max_age,
            },
        ));

        definitions
    }
}

//! Job scheduling type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{AsRefStr, Display, EnumString};

use crate::config::duration_serde::duration;
use crate::errors::RepositoryError;

/// When a job fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Fires every `period`, measured from the previous fire
    Interval {
        #[serde(with = "duration")]
        period: Duration,
    },
    /// Calendar rule; each field accepts cron syntax (`mon-fri`, `00`, `*/15`)
    ///
    /// Numeric weekdays count from 0 = Monday to 6 = Sunday, so `0-4` is
    /// Monday to Friday.
    Cron {
        day_of_week: String,
        hour: String,
        minute: String,
    },
}

impl Trigger {
    /// Interval trigger helper
    pub fn every(period: Duration) -> Self {
        Self::Interval { period }
    }

    /// Cron trigger helper
    pub fn cron<D: Into<String>, H: Into<String>, M: Into<String>>(
        day_of_week: D,
        hour: H,
        minute: M,
    ) -> Self {
        Self::Cron {
            day_of_week: day_of_week.into(),
            hour: hour.into(),
            minute: minute.into(),
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Interval { period } => {
                write!(f, "interval[{}]", humantime::format_duration(*period))
            }
            Trigger::Cron {
                day_of_week,
                hour,
                minute,
            } => write!(
                f,
                "cron[day_of_week='{day_of_week}', hour='{hour}', minute='{minute}']"
            ),
        }
    }
}

/// The work a job performs when it fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobWork {
    /// Fetch a feed and ingest its new entries
    FetchAndIngest { source_url: String },
    /// Delete execution records older than `max_age`
    PruneExecutions {
        #[serde(with = "duration")]
        max_age: Duration,
    },
}

impl JobWork {
    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            JobWork::FetchAndIngest { .. } => "fetch_and_ingest",
            JobWork::PruneExecutions { .. } => "prune_executions",
        }
    }
}

/// A job as declared at registration time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDefinition {
    /// Stable identifier, unique across the store
    pub id: String,
    pub trigger: Trigger,
    pub work: JobWork,
    /// Concurrency ceiling for executions of this job
    pub max_instances: u32,
    /// Registration flag: overwrite an existing definition with the same id
    pub replace_existing: bool,
}

impl JobDefinition {
    pub fn new<S: Into<String>>(id: S, trigger: Trigger, work: JobWork) -> Self {
        Self {
            id: id.into(),
            trigger,
            work,
            max_instances: 1,
            replace_existing: true,
        }
    }

    pub fn with_max_instances(mut self, max_instances: u32) -> Self {
        self.max_instances = max_instances;
        self
    }

    pub fn with_replace_existing(mut self, replace_existing: bool) -> Self {
        self.replace_existing = replace_existing;
        self
    }
}

/// A job definition as read back from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedJob {
    pub id: String,
    pub trigger: Trigger,
    pub work: JobWork,
    pub max_instances: u32,
    /// Next scheduled fire, when one has been computed
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle status of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Succeeded,
    Failed,
}

/// How an execution ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub status: ExecutionStatus,
    pub detail: Option<String>,
}

impl ExecutionOutcome {
    pub fn succeeded<S: Into<String>>(detail: S) -> Self {
        Self {
            status: ExecutionStatus::Succeeded,
            detail: Some(detail.into()),
        }
    }

    pub fn failed<S: Into<String>>(detail: S) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            detail: Some(detail.into()),
        }
    }
}

/// Handle returned by `record_execution_start`, consumed by `record_execution_end`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionHandle {
    pub id: i64,
    pub job_id: String,
    pub started_at: DateTime<Utc>,
}

/// One recorded run of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobExecution {
    pub id: i64,
    pub job_id: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub detail: Option<String>,
}

/// Errors that can occur in the job scheduling system
#[derive(Debug, thiserror::Error)]
pub enum JobSchedulingError {
    /// A definition with this id already exists and replacement was not requested
    #[error("Job with id '{id}' already exists")]
    ConflictingId { id: String },

    /// Trigger cannot produce fire times
    #[error("Invalid trigger for job '{id}': {reason}")]
    InvalidTrigger { id: String, reason: String },

    /// Invalid job configuration
    #[error("Invalid job configuration: {reason}")]
    InvalidJob { reason: String },

    /// Store operation failed
    #[error("Job store operation failed: {source}")]
    Store {
        #[from]
        source: RepositoryError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_trigger_json_shape() {
        let trigger = Trigger::every(Duration::from_secs(120));
        let json = serde_json::to_value(&trigger).unwrap();
        assert_eq!(json["type"], "interval");
        assert_eq!(json["period"], "2m");

        let back: Trigger = serde_json::from_value(json).unwrap();
        assert_eq!(back, trigger);

        let trigger: Trigger = serde_json::from_str(
            r#"{"type":"cron","day_of_week":"mon","hour":"00","minute":"00"}"#,
        )
        .unwrap();
        assert_eq!(trigger, Trigger::cron("mon", "00", "00"));
    }

    #[test]
    fn test_work_json_shape() {
        let work = JobWork::PruneExecutions {
            max_age: Duration::from_secs(604_800),
        };
        let json = serde_json::to_string(&work).unwrap();
        let back: JobWork = serde_json::from_str(&json).unwrap();
        assert_eq!(back, work);
        assert_eq!(work.kind(), "prune_executions");
    }

    #[test]
    fn test_execution_status_strings() {
        assert_eq!(ExecutionStatus::Succeeded.to_string(), "succeeded");
        assert_eq!(
            ExecutionStatus::from_str("running").unwrap(),
            ExecutionStatus::Running
        );
        assert!(ExecutionStatus::from_str("paused").is_err());
    }

    #[test]
    fn test_definition_defaults() {
        let def = JobDefinition::new(
            "feed",
            Trigger::every(Duration::from_secs(60)),
            JobWork::FetchAndIngest {
                source_url: "https://example.com/feed.xml".to_string(),
            },
        );
        assert_eq!(def.max_instances, 1);
        assert!(def.replace_existing);
        assert!(!def.with_replace_existing(false).replace_existing);
    }

    #[test]
    fn test_trigger_display() {
        assert_eq!(
            Trigger::cron("mon", "00", "00").to_string(),
            "cron[day_of_week='mon', hour='00', minute='00']"
        );
        assert_eq!(
            Trigger::every(Duration::from_secs(120)).to_string(),
            "interval[2m]"
        );
    }
}

//! Retention for execution history

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::info;

use crate::database::repositories::JobStoreSeaOrmRepository;
use crate::errors::RepositoryResult;

/// Deletes execution records older than a retention window
#[derive(Clone)]
pub struct ExecutionLogPruner {
    store: JobStoreSeaOrmRepository,
}

impl ExecutionLogPruner {
    pub fn new(store: JobStoreSeaOrmRepository) -> Self {
        Self { store }
    }

    /// Delete executions older than `max_age` relative to `now`; returns how many went
    pub async fn prune(&self, max_age: Duration, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let deleted = self.store.delete_executions_older_than(max_age, now).await?;
        info!(
            "Deleted {} job execution(s) older than {}",
            deleted,
            humantime::format_duration(max_age)
        );
        Ok(deleted)
    }
}

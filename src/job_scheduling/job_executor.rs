//! Job executor: resolves a job's work into the services that perform it

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, warn};

use super::execution_pruner::ExecutionLogPruner;
use super::types::{ExecutionOutcome, JobWork};
use crate::ingestor::EpisodeIngester;
use crate::observability::AppObservability;
use crate::sources::FeedSource;
use crate::utils::url::UrlUtils;

/// Executes [`JobWork`] and reports how it ended
///
/// Never returns an error: every failure is folded into the outcome so the
/// caller can record it and move on.
#[derive(Clone)]
pub struct JobExecutor {
    feed_source: Arc<dyn FeedSource>,
    ingester: EpisodeIngester,
    pruner: ExecutionLogPruner,
    observability: AppObservability,
}

impl JobExecutor {
    pub fn new(
        feed_source: Arc<dyn FeedSource>,
        ingester: EpisodeIngester,
        pruner: ExecutionLogPruner,
        observability: AppObservability,
    ) -> Self {
        Self {
            feed_source,
            ingester,
            pruner,
            observability,
        }
    }

    pub async fn execute(&self, job_id: &str, work: &JobWork) -> ExecutionOutcome {
        match work {
            JobWork::FetchAndIngest { source_url } => {
                self.execute_fetch_and_ingest(job_id, source_url).await
            }
            JobWork::PruneExecutions { max_age } => {
                match self.pruner.prune(*max_age, Utc::now()).await {
                    Ok(deleted) => {
                        self.observability.record_pruned(deleted);
                        ExecutionOutcome::succeeded(format!("pruned={deleted}"))
                    }
                    Err(e) => {
                        error!("Failed to prune job executions: {}", e);
                        ExecutionOutcome::failed(format!("prune failed: {e}"))
                    }
                }
            }
        }
    }

    async fn execute_fetch_and_ingest(&self, job_id: &str, source_url: &str) -> ExecutionOutcome {
        let feed = match self.feed_source.fetch(source_url).await {
            Ok(feed) => feed,
            Err(e) => {
                // Recovered here; the next scheduled fire retries
                warn!(
                    "Failed to fetch feed for job '{}' from {}: {}",
                    job_id,
                    UrlUtils::obfuscate_credentials(source_url),
                    e
                );
                self.observability.record_fetch_failure(job_id);
                return ExecutionOutcome::succeeded(format!("fetch failed: {e}"));
            }
        };

        match self.ingester.ingest(&feed).await {
            Ok(result) => {
                self.observability.record_ingest(
                    job_id,
                    result.added,
                    result.skipped,
                    result.failed.len(),
                );
                ExecutionOutcome::succeeded(result.summary())
            }
            Err(e) => {
                error!("Ingestion for job '{}' aborted: {}", job_id, e);
                ExecutionOutcome::failed(format!("ingest failed: {e}"))
            }
        }
    }
}

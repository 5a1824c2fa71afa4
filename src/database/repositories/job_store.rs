//! SeaORM-based job store
//!
//! Durable record of job definitions and their execution history. Every
//! operation is a single statement or a single transaction, so its effect is
//! visible to the next read, including after a restart.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::entities::{
    job_definitions, job_executions,
    prelude::{JobDefinitions, JobExecutions},
};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::job_scheduling::{
    ExecutionHandle, ExecutionOutcome, ExecutionStatus, JobDefinition, JobExecution, JobWork,
    JobSchedulingError, PersistedJob, Trigger,
};

/// SeaORM-based repository for job definitions and executions
#[derive(Clone)]
pub struct JobStoreSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl JobStoreSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Insert or replace a job definition
    ///
    /// An existing row is only overwritten when `replace_existing` is set.
    /// The stored next run time survives replacement when the trigger is
    /// unchanged, so a restart resumes the previous schedule.
    pub async fn upsert_definition(
        &self,
        definition: &JobDefinition,
        now: DateTime<Utc>,
    ) -> Result<PersistedJob, JobSchedulingError> {
        let max_instances = i32::try_from(definition.max_instances).map_err(|_| {
            JobSchedulingError::InvalidJob {
                reason: format!(
                    "max_instances {} for job '{}' is out of range",
                    definition.max_instances, definition.id
                ),
            }
        })?;
        let trigger_json = serde_json::to_string(&definition.trigger).map_err(RepositoryError::from)?;
        let work_json = serde_json::to_string(&definition.work).map_err(RepositoryError::from)?;

        let txn = self.connection.begin().await.map_err(RepositoryError::from)?;

        let existing = JobDefinitions::find_by_id(definition.id.clone())
            .one(&txn)
            .await
            .map_err(RepositoryError::from)?;

        let model = match existing {
            Some(_) if !definition.replace_existing => {
                return Err(JobSchedulingError::ConflictingId {
                    id: definition.id.clone(),
                });
            }
            Some(existing_model) => {
                let previous_trigger: Option<Trigger> =
                    serde_json::from_str(&existing_model.trigger).ok();
                let keep_next_run = previous_trigger.as_ref() == Some(&definition.trigger);
                let next_run_at = if keep_next_run {
                    existing_model.next_run_at
                } else {
                    None
                };

                let mut active_model: job_definitions::ActiveModel = existing_model.into();
                active_model.trigger = Set(trigger_json);
                active_model.work = Set(work_json);
                active_model.max_instances = Set(max_instances);
                active_model.next_run_at = Set(next_run_at);
                active_model.updated_at = Set(now);

                debug!(
                    "Replacing job definition '{}' (schedule kept: {})",
                    definition.id, keep_next_run
                );
                active_model.update(&txn).await.map_err(RepositoryError::from)?
            }
            None => {
                let active_model = job_definitions::ActiveModel {
                    id: Set(definition.id.clone()),
                    trigger: Set(trigger_json),
                    work: Set(work_json),
                    max_instances: Set(max_instances),
                    next_run_at: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                active_model.insert(&txn).await.map_err(RepositoryError::from)?
            }
        };

        txn.commit().await.map_err(RepositoryError::from)?;
        Ok(Self::definition_to_domain(model)?)
    }

    /// All persisted definitions, ordered by id
    ///
    /// Rows that no longer decode are logged and left out.
    pub async fn load_all_definitions(&self) -> RepositoryResult<Vec<PersistedJob>> {
        let models = JobDefinitions::find()
            .order_by_asc(job_definitions::Column::Id)
            .all(&*self.connection)
            .await?;

        Ok(models
            .into_iter()
            .filter_map(|model| {
                let id = model.id.clone();
                match Self::definition_to_domain(model) {
                    Ok(job) => Some(job),
                    Err(e) => {
                        warn!("Skipping stored job '{}' that cannot be decoded: {}", id, e);
                        None
                    }
                }
            })
            .collect())
    }

    pub async fn find_definition(&self, id: &str) -> RepositoryResult<Option<PersistedJob>> {
        JobDefinitions::find_by_id(id.to_string())
            .one(&*self.connection)
            .await?
            .map(Self::definition_to_domain)
            .transpose()
    }

    /// Persist the next scheduled fire of a job
    pub async fn update_next_run(
        &self,
        id: &str,
        next_run_at: Option<DateTime<Utc>>,
    ) -> RepositoryResult<()> {
        let result = JobDefinitions::update_many()
            .col_expr(
                job_definitions::Column::NextRunAt,
                sea_orm::sea_query::Expr::value(next_run_at),
            )
            .filter(job_definitions::Column::Id.eq(id))
            .exec(&*self.connection)
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::record_not_found("job_definitions", "id", id));
        }
        Ok(())
    }

    /// Move the next run of a job forward to `next_run_at`
    ///
    /// A stored value at or after `next_run_at` is left alone, so writes
    /// from executions that finish out of order never move the schedule
    /// backwards.
    pub async fn advance_next_run(
        &self,
        id: &str,
        next_run_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        JobDefinitions::update_many()
            .col_expr(
                job_definitions::Column::NextRunAt,
                sea_orm::sea_query::Expr::value(Some(next_run_at)),
            )
            .filter(job_definitions::Column::Id.eq(id))
            .filter(
                Condition::any()
                    .add(job_definitions::Column::NextRunAt.is_null())
                    .add(job_definitions::Column::NextRunAt.lt(next_run_at)),
            )
            .exec(&*self.connection)
            .await?;
        Ok(())
    }

    /// Explicitly deregister a job; its execution history is kept
    pub async fn remove_definition(&self, id: &str) -> RepositoryResult<bool> {
        let result = JobDefinitions::delete_by_id(id.to_string())
            .exec(&*self.connection)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Record that an execution has started
    pub async fn record_execution_start(
        &self,
        job_id: &str,
        started_at: DateTime<Utc>,
    ) -> RepositoryResult<ExecutionHandle> {
        let active_model = job_executions::ActiveModel {
            job_id: Set(job_id.to_string()),
            status: Set(ExecutionStatus::Running.to_string()),
            started_at: Set(started_at),
            finished_at: Set(None),
            duration_ms: Set(None),
            detail: Set(None),
            ..Default::default()
        };
        let model = active_model.insert(&*self.connection).await?;

        Ok(ExecutionHandle {
            id: model.id,
            job_id: model.job_id,
            started_at: model.started_at,
        })
    }

    /// Record how an execution ended
    pub async fn record_execution_end(
        &self,
        handle: &ExecutionHandle,
        outcome: &ExecutionOutcome,
        finished_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let duration_ms = (finished_at - handle.started_at).num_milliseconds().max(0);

        let active_model = job_executions::ActiveModel {
            id: Set(handle.id),
            status: Set(outcome.status.to_string()),
            finished_at: Set(Some(finished_at)),
            duration_ms: Set(Some(duration_ms)),
            detail: Set(outcome.detail.clone()),
            ..Default::default()
        };

        match active_model.update(&*self.connection).await {
            Ok(_) => Ok(()),
            Err(sea_orm::DbErr::RecordNotUpdated) => Err(RepositoryError::record_not_found(
                "job_executions",
                "id",
                handle.id.to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Execution history of one job, oldest first
    pub async fn list_executions(&self, job_id: &str) -> RepositoryResult<Vec<JobExecution>> {
        JobExecutions::find()
            .filter(job_executions::Column::JobId.eq(job_id))
            .order_by_asc(job_executions::Column::StartedAt)
            .order_by_asc(job_executions::Column::Id)
            .all(&*self.connection)
            .await?
            .into_iter()
            .map(Self::execution_to_domain)
            .collect()
    }

    /// Delete executions that finished more than `max_age` before `now`
    ///
    /// Rows that never finished (orphaned by a crash) are removed once their
    /// start is older than the cutoff. Returns the number of deleted rows.
    pub async fn delete_executions_older_than(
        &self,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        let max_age = chrono::Duration::from_std(max_age).map_err(|e| {
            RepositoryError::invalid_data("job_executions", format!("max_age out of range: {e}"))
        })?;
        let cutoff = now - max_age;

        let result = JobExecutions::delete_many()
            .filter(
                Condition::any()
                    .add(job_executions::Column::FinishedAt.lt(cutoff))
                    .add(
                        Condition::all()
                            .add(job_executions::Column::FinishedAt.is_null())
                            .add(job_executions::Column::StartedAt.lt(cutoff)),
                    ),
            )
            .exec(&*self.connection)
            .await?;

        Ok(result.rows_affected)
    }

    fn definition_to_domain(model: job_definitions::Model) -> RepositoryResult<PersistedJob> {
        let trigger: Trigger = serde_json::from_str(&model.trigger)?;
        let work: JobWork = serde_json::from_str(&model.work)?;
        let max_instances = u32::try_from(model.max_instances).map_err(|_| {
            RepositoryError::invalid_data(
                "job_definitions",
                format!(
                    "job '{}' has invalid max_instances {}",
                    model.id, model.max_instances
                ),
            )
        })?;

        Ok(PersistedJob {
            id: model.id,
            trigger,
            work,
            max_instances,
            next_run_at: model.next_run_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    fn execution_to_domain(model: job_executions::Model) -> RepositoryResult<JobExecution> {
        let status = ExecutionStatus::from_str(&model.status).map_err(|e| {
            RepositoryError::invalid_data(
                "job_executions",
                format!("execution {} has invalid status '{}': {e}", model.id, model.status),
            )
        })?;

        Ok(JobExecution {
            id: model.id,
            job_id: model.job_id,
            status,
            started_at: model.started_at,
            finished_at: model.finished_at,
            duration_ms: model.duration_ms,
            detail: model.detail,
        })
    }
}

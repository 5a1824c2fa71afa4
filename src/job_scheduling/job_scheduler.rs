//! Scheduler engine: fires persisted jobs on their triggers
//!
//! The engine owns an in-memory view of the job store. A single control loop
//! evaluates due jobs every poll interval and hands each fire to its own
//! tokio task, so a slow feed never delays the others. Per-job instance
//! counters enforce `max_instances`; a fire that would exceed it is skipped,
//! not queued.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::job_executor::JobExecutor;
use super::trigger::CompiledTrigger;
use super::types::{ExecutionStatus, JobDefinition, JobSchedulingError, JobWork, PersistedJob, Trigger};
use crate::config::SchedulerConfig;
use crate::database::repositories::JobStoreSeaOrmRepository;
use crate::errors::AppResult;
use crate::observability::AppObservability;

/// Runtime knobs of the engine
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub timezone: Tz,
    pub poll_interval: Duration,
    pub shutdown_grace_period: Duration,
    /// Fire once on startup for a fire time missed while the process was down
    pub run_missed_immediately: bool,
}

impl SchedulerSettings {
    pub fn from_config(config: &SchedulerConfig) -> AppResult<Self> {
        Ok(Self {
            timezone: config.tz()?,
            poll_interval: config.poll_interval,
            shutdown_grace_period: config.shutdown_grace_period,
            run_missed_immediately: config.run_missed_immediately,
        })
    }
}

/// A registered job as the control loop sees it
struct ScheduledJob {
    trigger: Trigger,
    compiled: CompiledTrigger,
    work: JobWork,
    max_instances: u32,
    next_fire: Option<DateTime<Utc>>,
    running: Arc<AtomicUsize>,
}

/// Holds one slot of a job's instance budget until dropped
struct InstanceGuard {
    running: Arc<AtomicUsize>,
}

impl InstanceGuard {
    fn acquire(running: Arc<AtomicUsize>) -> Self {
        running.fetch_add(1, Ordering::SeqCst);
        Self { running }
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Persistent job scheduler
pub struct SchedulerEngine {
    store: JobStoreSeaOrmRepository,
    executor: JobExecutor,
    observability: AppObservability,
    settings: SchedulerSettings,
    jobs: BTreeMap<String, ScheduledJob>,
}

impl SchedulerEngine {
    pub fn new(
        store: JobStoreSeaOrmRepository,
        executor: JobExecutor,
        observability: AppObservability,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            store,
            executor,
            observability,
            settings,
            jobs: BTreeMap::new(),
        }
    }

    /// Register a job definition in the store and in the running schedule
    ///
    /// Fails with [`JobSchedulingError::ConflictingId`] when the id is taken
    /// and the definition does not ask for replacement.
    pub async fn add_job(
        &mut self,
        definition: &JobDefinition,
        now: DateTime<Utc>,
    ) -> Result<(), JobSchedulingError> {
        if definition.id.trim().is_empty() {
            return Err(JobSchedulingError::InvalidJob {
                reason: "job id must not be empty".to_string(),
            });
        }
        if definition.max_instances == 0 {
            return Err(JobSchedulingError::InvalidJob {
                reason: format!("job '{}' must allow at least one instance", definition.id),
            });
        }
        CompiledTrigger::compile(&definition.id, &definition.trigger)?;

        let persisted = self.store.upsert_definition(definition, now).await?;
        self.schedule(persisted, now).await?;
        Ok(())
    }

    /// Register every definition in order, stopping at the first failure
    pub async fn register(
        &mut self,
        definitions: &[JobDefinition],
        now: DateTime<Utc>,
    ) -> Result<(), JobSchedulingError> {
        for definition in definitions {
            self.add_job(definition, now).await?;
        }
        Ok(())
    }

    /// Rebuild the schedule from every definition in the store
    ///
    /// Persisted rows that can no longer be compiled are logged and left out.
    /// Returns the number of scheduled jobs.
    pub async fn load(&mut self, now: DateTime<Utc>) -> Result<usize, JobSchedulingError> {
        let persisted = self.store.load_all_definitions().await?;
        let mut loaded = BTreeMap::new();

        for job in persisted {
            let id = job.id.clone();
            match self.prepare(job, now).await {
                Ok(scheduled) => {
                    loaded.insert(id, scheduled);
                }
                Err(JobSchedulingError::InvalidTrigger { id, reason }) => {
                    warn!("Not scheduling stored job '{}': {}", id, reason);
                }
                Err(e) => return Err(e),
            }
        }

        self.jobs = loaded;
        Ok(self.jobs.len())
    }

    /// Remove a job from the store and the schedule; running instances finish
    pub async fn remove_job(&mut self, id: &str) -> Result<bool, JobSchedulingError> {
        let removed = self.store.remove_definition(id).await?;
        if self.jobs.remove(id).is_some() || removed {
            info!("Removed job: {}", id);
            return Ok(true);
        }
        Ok(false)
    }

    pub fn job_ids(&self) -> Vec<String> {
        self.jobs.keys().cloned().collect()
    }

    pub fn next_fire_time(&self, id: &str) -> Option<DateTime<Utc>> {
        self.jobs.get(id).and_then(|job| job.next_fire)
    }

    pub fn running_instances(&self, id: &str) -> usize {
        self.jobs
            .get(id)
            .map(|job| job.running.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    fn total_running(&self) -> usize {
        self.jobs
            .values()
            .map(|job| job.running.load(Ordering::SeqCst))
            .sum()
    }

    async fn schedule(&mut self, job: PersistedJob, now: DateTime<Utc>) -> Result<(), JobSchedulingError> {
        let id = job.id.clone();
        let scheduled = self.prepare(job, now).await?;
        match scheduled.next_fire {
            Some(next) => info!(
                "Added job: {} ({}; next run at {})",
                id,
                scheduled.trigger,
                next.with_timezone(&self.settings.timezone)
            ),
            None => info!("Added job: {} ({}; no further runs)", id, scheduled.trigger),
        }
        self.jobs.insert(id, scheduled);
        Ok(())
    }

    /// Compile a persisted job and settle its next fire time
    async fn prepare(
        &self,
        job: PersistedJob,
        now: DateTime<Utc>,
    ) -> Result<ScheduledJob, JobSchedulingError> {
        let compiled = CompiledTrigger::compile(&job.id, &job.trigger)?;
        let tz = self.settings.timezone;

        let next_fire = match job.next_run_at {
            Some(next) if next > now => Some(next),
            Some(missed) if self.settings.run_missed_immediately => {
                debug!("Job '{}' missed its run at {}, running it now", job.id, missed);
                Some(missed)
            }
            Some(missed) => {
                debug!("Job '{}' missed its run at {}, skipping ahead", job.id, missed);
                compiled.next_after(missed, now, tz)
            }
            None => compiled.first_fire(now, tz),
        };

        if next_fire != job.next_run_at {
            self.store.update_next_run(&job.id, next_fire).await?;
        }

        // Keep the instance counter of a job that is already running
        let running = self
            .jobs
            .get(&job.id)
            .map(|existing| existing.running.clone())
            .unwrap_or_default();

        Ok(ScheduledJob {
            trigger: job.trigger,
            compiled,
            work: job.work,
            max_instances: job.max_instances,
            next_fire,
            running,
        })
    }

    /// Fire every job due at `now`
    ///
    /// Each fire advances the job's next fire time, whether it is dispatched
    /// or skipped for being at `max_instances`. Store writes happen on the
    /// spawned tasks; the returned handles cover them and the dispatched
    /// executions, and the control loop never waits on them.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<JoinHandle<()>> {
        let tz = self.settings.timezone;
        let mut handles = Vec::new();

        for (id, job) in self.jobs.iter_mut() {
            let Some(due) = job.next_fire else {
                continue;
            };
            if due > now {
                continue;
            }

            let next_fire = job.compiled.next_after(due, now, tz);
            job.next_fire = next_fire;

            if job.running.load(Ordering::SeqCst) >= job.max_instances as usize {
                warn!(
                    "Execution of job \"{}\" skipped: maximum number of running instances reached ({})",
                    id, job.max_instances
                );
                self.observability.record_skipped_fire(id);
                handles.push(tokio::spawn(persist_next_run(
                    self.store.clone(),
                    id.clone(),
                    next_fire,
                )));
                continue;
            }

            let guard = InstanceGuard::acquire(job.running.clone());
            handles.push(tokio::spawn(run_job(
                self.store.clone(),
                self.executor.clone(),
                self.observability.clone(),
                id.clone(),
                job.work.clone(),
                next_fire,
                guard,
            )));
        }

        handles
    }

    /// Run the control loop until `cancellation_token` is cancelled
    ///
    /// On cancellation no new fires are dispatched; executions in flight get
    /// the configured grace period to finish.
    pub async fn run(mut self, cancellation_token: CancellationToken) -> AppResult<()> {
        info!("Starting scheduler...");
        let mut ticker = interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Executions are detached; the instance counters track them
                    let _ = self.tick(Utc::now());
                }
                _ = cancellation_token.cancelled() => {
                    info!("Stopping scheduler...");
                    break;
                }
            }
        }

        self.wait_for_running_jobs_to_complete(self.settings.shutdown_grace_period)
            .await;
        info!("Scheduler shut down successfully!");
        Ok(())
    }

    /// Wait up to `max_wait` for running executions; true when all finished
    pub async fn wait_for_running_jobs_to_complete(&self, max_wait: Duration) -> bool {
        if self.total_running() == 0 {
            return true;
        }

        info!("Waiting for running jobs to complete...");
        let mut check_interval = interval(Duration::from_millis(100));
        let start = tokio::time::Instant::now();

        loop {
            check_interval.tick().await;

            let running = self.total_running();
            if running == 0 {
                info!("All jobs completed successfully");
                return true;
            }
            if start.elapsed() >= max_wait {
                warn!(
                    "Timeout waiting for {} jobs to complete, proceeding with shutdown",
                    running
                );
                return false;
            }
        }
    }
}

async fn persist_next_run(
    store: JobStoreSeaOrmRepository,
    job_id: String,
    next_fire: Option<DateTime<Utc>>,
) {
    let result = match next_fire {
        Some(at) => store.advance_next_run(&job_id, at).await,
        None => store.update_next_run(&job_id, None).await,
    };
    if let Err(e) = result {
        warn!("Failed to persist next run of job '{}': {}", job_id, e);
    }
}

/// One execution: persist the schedule, record start, run, record end
async fn run_job(
    store: JobStoreSeaOrmRepository,
    executor: JobExecutor,
    observability: AppObservability,
    job_id: String,
    work: JobWork,
    next_fire: Option<DateTime<Utc>>,
    guard: InstanceGuard,
) {
    let _guard = guard;
    persist_next_run(store.clone(), job_id.clone(), next_fire).await;

    let handle = match store.record_execution_start(&job_id, Utc::now()).await {
        Ok(handle) => handle,
        Err(e) => {
            error!(
                "Failed to record start of job '{}', not running it: {}",
                job_id, e
            );
            observability.record_execution(&job_id, ExecutionStatus::Failed.as_ref(), 0.0);
            return;
        }
    };

    debug!("Running job \"{}\" ({})", job_id, work.kind());
    let outcome = executor.execute(&job_id, &work).await;
    let finished_at = Utc::now();
    let elapsed = (finished_at - handle.started_at).num_milliseconds().max(0) as f64 / 1000.0;

    match outcome.status {
        ExecutionStatus::Failed => error!(
            "Job \"{}\" raised an error: {}",
            job_id,
            outcome.detail.as_deref().unwrap_or("unknown error")
        ),
        _ => info!(
            "Job \"{}\" executed successfully ({})",
            job_id,
            outcome.detail.as_deref().unwrap_or("no detail")
        ),
    }

    if let Err(e) = store.record_execution_end(&handle, &outcome, finished_at).await {
        error!(
            "Failed to record end of execution {} for job '{}': {}",
            handle.id, job_id, e
        );
    }
    observability.record_execution(&job_id, outcome.status.as_ref(), elapsed);
}

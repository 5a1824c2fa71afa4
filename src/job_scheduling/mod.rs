//! Job scheduling subsystem for podcast-ingest
//!
//! Jobs are durable: definitions and their next fire times live in the
//! database, so a restart resumes the schedule instead of starting over.
//!
//! The system is built around four main components:
//! - `SchedulerEngine`: evaluates triggers and dispatches due jobs
//! - `CompiledTrigger`: fire-time computation for interval and cron triggers
//! - `JobExecutor`: actual work execution service
//! - `ExecutionLogPruner`: retention for the execution history

pub mod execution_pruner;
pub mod job_executor;
pub mod job_scheduler;
pub mod trigger;
pub mod types;

pub use execution_pruner::ExecutionLogPruner;
pub use job_executor::JobExecutor;
pub use job_scheduler::{SchedulerEngine, SchedulerSettings};
pub use trigger::CompiledTrigger;
pub use types::*;

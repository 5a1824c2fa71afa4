//! SeaORM entities for the podcast-ingest schema

pub mod prelude;

pub mod episodes;
pub mod job_definitions;
pub mod job_executions;

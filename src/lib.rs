//! Scheduled podcast feed ingestion
//!
//! Periodically fetches a fixed set of RSS/Atom feeds and stores each episode
//! exactly once, keyed by its guid. Job definitions, their schedule and their
//! execution history are persisted so the scheduler survives restarts.

pub mod config;
pub mod database;
pub mod entities;
pub mod errors;
pub mod ingestor;
pub mod job_scheduling;
pub mod models;
pub mod observability;
pub mod sources;
pub mod utils;

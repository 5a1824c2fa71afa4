//! Centralized error handling for podcast-ingest
//!
//! # Error Categories
//!
//! - **Source Errors**: feed retrieval and document parsing (recovered per fire)
//! - **Entry Errors**: a single feed entry that cannot be ingested (recovered per entry)
//! - **Repository Errors**: data access failures (surface as a failed execution)
//! - **Configuration/Startup Errors**: fatal before the scheduler starts
//!
//! # Usage
//!
//! ```rust
//! use podcast_ingest::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Err(AppError::configuration("scheduler.timezone is empty"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Repository Results
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Convenience type alias for Source Results
pub type SourceResult<T> = Result<T, SourceError>;

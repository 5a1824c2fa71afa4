//! Error type definitions for podcast-ingest
//!
//! The hierarchy mirrors the failure taxonomy of the scheduler: fetch
//! failures are recovered per fire, entry failures per entry, persistence
//! failures per execution, and configuration/startup failures are fatal.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors (SeaORM)
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Repository layer errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Feed source errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Job registration and scheduling errors
    #[error("Scheduling error: {0}")]
    Scheduling(#[from] crate::job_scheduling::JobSchedulingError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Startup failures that must prevent the control loop from running
    #[error("Startup error: {message}")]
    Startup { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Repository layer specific errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database errors from SeaORM
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Data serialization/deserialization failures
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Record not found
    #[error("Record not found: {table} with {field} = {value}")]
    RecordNotFound {
        table: String,
        field: String,
        value: String,
    },

    /// Constraint violations (unique, foreign key, etc.)
    #[error("Constraint violation: {constraint} - {message}")]
    ConstraintViolation { constraint: String, message: String },

    /// Stored data that cannot be mapped back into a domain model
    #[error("Invalid stored data in {table}: {message}")]
    InvalidData { table: String, message: String },
}

/// Feed retrieval errors (network, timeout, malformed document)
#[derive(Error, Debug)]
pub enum SourceError {
    /// Request exceeded the configured timeout
    #[error("Connection timeout: {url}")]
    Timeout { url: String },

    /// URL is not a well-formed http(s) URL
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// Transport-level failure (DNS, connection refused, TLS, ...)
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    /// HTTP errors from external sources
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Response body larger than the configured cap
    #[error("Response from {url} too large: {size} bytes (max: {max_size})")]
    PayloadTooLarge {
        url: String,
        size: usize,
        max_size: usize,
    },

    /// Parsing errors for source data
    #[error("Parse error: {source_type} - {message}")]
    ParseError { source_type: String, message: String },
}

/// Per-entry ingestion errors; the entry is skipped, the batch continues
#[derive(Error, Debug)]
pub enum EntryError {
    /// Neither a guid nor a link to fall back on
    #[error("Entry has no guid")]
    MissingGuid,

    /// Entry has no publication date at all
    #[error("Entry '{guid}' has no publication date")]
    MissingPubDate { guid: String },

    /// Publication date present but unparsable
    #[error("Entry '{guid}' has unparsable publication date: {source}")]
    InvalidPubDate {
        guid: String,
        #[source]
        source: crate::utils::datetime::DateTimeError,
    },

    /// Persisting this entry failed
    #[error("Failed to store entry '{guid}': {source}")]
    Persistence {
        guid: String,
        #[source]
        source: RepositoryError,
    },
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a configuration error with a custom message
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a startup error
    pub fn startup<S: Into<String>>(message: S) -> Self {
        Self::Startup {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl RepositoryError {
    /// Create a record not found error
    pub fn record_not_found<T: Into<String>, F: Into<String>, V: Into<String>>(
        table: T,
        field: F,
        value: V,
    ) -> Self {
        Self::RecordNotFound {
            table: table.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a constraint violation error
    pub fn constraint_violation<C: Into<String>, M: Into<String>>(
        constraint: C,
        message: M,
    ) -> Self {
        Self::ConstraintViolation {
            constraint: constraint.into(),
            message: message.into(),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data<T: Into<String>, M: Into<String>>(table: T, message: M) -> Self {
        Self::InvalidData {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a unique-constraint violation reported by the store
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(err) => matches!(
                err.sql_err(),
                Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
            ),
            Self::ConstraintViolation { .. } => true,
            _ => false,
        }
    }
}

impl SourceError {
    /// Create a timeout error
    pub fn timeout<U: Into<String>>(url: U) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Create an invalid URL error
    pub fn invalid_url<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse_error<S: Into<String>, M: Into<String>>(source_type: S, message: M) -> Self {
        Self::ParseError {
            source_type: source_type.into(),
            message: message.into(),
        }
    }
}

impl EntryError {
    /// Guid of the failing entry, when one was present
    pub fn guid(&self) -> Option<&str> {
        match self {
            Self::MissingGuid => None,
            Self::MissingPubDate { guid }
            | Self::InvalidPubDate { guid, .. }
            | Self::Persistence { guid, .. } => Some(guid),
        }
    }
}

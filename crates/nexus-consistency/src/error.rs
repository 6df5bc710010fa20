//! Error types for the consistency checker
//!
//! Only engine-level failures live here. Inconsistencies found in the
//! store are data, not errors, and travel through
//! [`ConsistencyReporter`](crate::report::ConsistencyReporter).

use std::time::Duration;

use thiserror::Error;

use crate::report::ConsistencySummaryStatistics;

/// Result type alias using the checker Error
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors that abort a consistency check
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors from stores or report files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A store could not serve a read
    #[error("Store error: {0}")]
    Store(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A worker thread died or could not be spawned
    #[error("Worker error: {0}")]
    Worker(String),

    /// A worker did not acknowledge a stop request in time
    #[error("Worker {worker} did not stop within {timeout:?}")]
    WorkerTimeout {
        /// Worker id
        worker: usize,
        /// Drop-dead timeout that elapsed
        timeout: Duration,
    },

    /// The check was stopped before every stage completed
    #[error("Consistency check cancelled")]
    Cancelled,

    /// A stage failed; carries whatever was detected before the failure
    #[error("Consistency check aborted: {cause}")]
    Aborted {
        /// Underlying failure
        cause: Box<Error>,
        /// Inconsistencies counted up to the abort
        partial: Box<ConsistencySummaryStatistics>,
    },

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a worker error
    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Partial summary attached to an aborted run, if any
    pub fn partial_summary(&self) -> Option<&ConsistencySummaryStatistics> {
        match self {
            Self::Aborted { partial, .. } => Some(partial),
            _ => None,
        }
    }

    /// True when the run ended because stop was requested
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Aborted { cause, .. } => cause.is_cancelled(),
            _ => false,
        }
    }
}

//! Nexus Consistency - offline full consistency checker for the graph record store
//!
//! This crate walks every record store of a stopped database and reports
//! structural inconsistencies without modifying anything:
//! - Node, relationship, relationship group and property records
//! - Dynamic string, array, label and token name blocks
//! - Tokens, schema rules and the neostore record
//! - Counts store, label / relationship type scan stores and schema indexes
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │        FullCheck (scan coordinator)          │
//! │   stage order, pass planning, cancellation  │
//! └──────────────┬──────────────────────────────┘
//!                │
//! ┌──────────────┴──────────────────────────────┐
//! │         Scanners + worker pool               │
//! │  (sequential / parallel, queue distributors)│
//! └──────────────┬──────────────────────────────┘
//!                │
//! ┌──────────────┴──────────────────────────────┐
//! │              Checkers                        │
//! │ (node cache, deferred references, multi-pass│
//! │  record access, per-store record checks)    │
//! └──────────────┬──────────────────────────────┘
//!                │
//! ┌──────────────┴──────────────────────────────┐
//! │    Stores (read-only)  │  Reporter + sinks   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Inconsistencies are data and end up in the
//! [`ConsistencySummaryStatistics`]; only engine failures are [`Error`]s.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod checking;
pub mod config;
pub mod error;
pub mod full_check;
pub mod progress;
pub mod report;
pub mod scan;
pub mod store;
pub mod testing;

use std::sync::Arc;

pub use config::{CheckConfig, ConsistencyFlags, Distribution};
pub use error::{Error, Result};
pub use full_check::{FullCheck, Stage};
pub use report::{ConsistencySummaryStatistics, InconsistencySink, RecordType};
pub use store::StoreAccess;

/// Run a full check with default settings and `threads` workers
pub fn execute(
    stores: Arc<StoreAccess>,
    sink: Arc<dyn InconsistencySink>,
    threads: usize,
) -> Result<ConsistencySummaryStatistics> {
    FullCheck::new(CheckConfig::with_threads(threads)).execute(stores, sink)
}

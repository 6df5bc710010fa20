//! Consistency check configuration
//!
//! Loaded from TOML the same way the server loads its config files:
//! every section is `#[serde(default)]`, so a partial file only overrides
//! what it names.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How relationship records are spread over worker queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    /// Batches of consecutive records per queue, cycling through queues
    RoundRobin,
    /// Queue chosen by endpoint node id; may deliver a record twice
    Relationships,
}

/// Which families of checks to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistencyFlags {
    /// Record store stages (nodes through token names)
    pub check_graph: bool,
    /// Schema index entries against nodes
    pub check_indexes: bool,
    /// Label and relationship type scan stores
    pub check_label_scan_store: bool,
    /// Ownership tracking of property chains and dynamic blocks
    pub check_property_owners: bool,
    /// Counts store against observed counts
    pub check_counts: bool,
}

impl Default for ConsistencyFlags {
    fn default() -> Self {
        Self {
            check_graph: true,
            check_indexes: true,
            check_label_scan_store: true,
            check_property_owners: true,
            check_counts: true,
        }
    }
}

/// Full check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Worker threads for parallel stages
    pub threads: usize,
    /// Capacity of each worker queue (backpressure point)
    pub queue_capacity: usize,
    /// Consecutive records sent to one queue by the round-robin distributor
    pub records_per_queue: u64,
    /// Stores with fewer ids than this are scanned sequentially
    pub sequential_threshold: u64,
    /// Split stages into one pass per referenced partition
    pub multi_pass: bool,
    /// Distribution used for the relationship stage
    pub relationship_distribution: Distribution,
    /// Worker queue poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// How long a stop request may take to reach every worker, in milliseconds
    pub drop_dead_timeout_ms: u64,
    /// Optional line-oriented report file
    pub report_path: Option<PathBuf>,
    /// Check families
    pub flags: ConsistencyFlags,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            queue_capacity: 1_000,
            records_per_queue: 100,
            sequential_threshold: 1_000,
            multi_pass: true,
            relationship_distribution: Distribution::Relationships,
            poll_interval_ms: 10,
            drop_dead_timeout_ms: 30_000,
            report_path: None,
            flags: ConsistencyFlags::default(),
        }
    }
}

impl CheckConfig {
    /// Default configuration with an explicit thread count
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads,
            ..Self::default()
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::config(format!("invalid check configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!("Loaded consistency check configuration from {:?}", path);
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(Error::config("threads must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(Error::config("queue_capacity must be at least 1"));
        }
        if self.records_per_queue == 0 {
            return Err(Error::config("records_per_queue must be at least 1"));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::config("poll_interval_ms must be at least 1"));
        }
        Ok(())
    }

    /// Worker queue poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Drop-dead timeout for the stop path
    pub fn drop_dead_timeout(&self) -> Duration {
        Duration::from_millis(self.drop_dead_timeout_ms)
    }
}

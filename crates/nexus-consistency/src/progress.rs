//! Progress and cache statistics sinks

use std::time::Instant;

/// Creates one listener per stage (or pass) of the check
pub trait ProgressMonitorFactory: Send + Sync {
    /// Listener for a named part expected to process `total` records
    fn progress_for_part(&self, name: &str, total: u64) -> Box<dyn ProgressListener>;
}

/// Receives progress for one part
pub trait ProgressListener: Send {
    /// `n` more records consumed
    fn add(&mut self, n: u64);

    /// Part finished
    fn done(&mut self);
}

/// Discards progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressMonitorFactory for NoProgress {
    fn progress_for_part(&self, _name: &str, _total: u64) -> Box<dyn ProgressListener> {
        Box::new(NoProgress)
    }
}

impl ProgressListener for NoProgress {
    fn add(&mut self, _n: u64) {}

    fn done(&mut self) {}
}

/// Logs every tenth of a part and its elapsed time
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingProgress;

impl ProgressMonitorFactory for LoggingProgress {
    fn progress_for_part(&self, name: &str, total: u64) -> Box<dyn ProgressListener> {
        Box::new(LoggingListener {
            name: name.to_string(),
            total,
            seen: 0,
            last_tenth: 0,
            started: Instant::now(),
        })
    }
}

struct LoggingListener {
    name: String,
    total: u64,
    seen: u64,
    last_tenth: u64,
    started: Instant,
}

impl ProgressListener for LoggingListener {
    fn add(&mut self, n: u64) {
        self.seen += n;
        if self.total == 0 {
            return;
        }
        let tenth = (self.seen.min(self.total) * 10) / self.total;
        if tenth > self.last_tenth {
            self.last_tenth = tenth;
            tracing::info!("{}: {}%", self.name, tenth * 10);
        }
    }

    fn done(&mut self) {
        tracing::info!(
            "{}: done, {} records in {:?}",
            self.name,
            self.seen,
            self.started.elapsed()
        );
    }
}

/// Cache and deferred reference counters after a stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStatistics {
    /// Stage the numbers were taken after
    pub stage: String,
    /// Node cache cells allocated
    pub node_cells: u64,
    /// Deferred checks registered
    pub deferred_registered: u64,
    /// Deferred checks run when their target arrived
    pub resolved_on_arrival: u64,
    /// Deferred checks run with a direct read because the target had already passed
    pub resolved_directly: u64,
    /// Deferred checks whose target never arrived
    pub dangling: u64,
}

/// Receives [`CacheStatistics`] after each stage
pub trait CacheStatsSink: Send + Sync {
    /// Stage statistics
    fn report(&self, stats: &CacheStatistics);
}

/// Logs cache statistics at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCacheStats;

impl CacheStatsSink for LoggingCacheStats {
    fn report(&self, stats: &CacheStatistics) {
        tracing::debug!(
            stage = %stats.stage,
            node_cells = stats.node_cells,
            deferred = stats.deferred_registered,
            on_arrival = stats.resolved_on_arrival,
            direct = stats.resolved_directly,
            dangling = stats.dangling,
            "cache statistics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use parking_lot::Mutex;

    struct Recording {
        events: Arc<Mutex<Vec<u64>>>,
    }

    impl ProgressListener for Recording {
        fn add(&mut self, n: u64) {
            self.events.lock().push(n);
        }

        fn done(&mut self) {
            self.events.lock().push(0);
        }
    }

    #[test]
    fn test_logging_listener_counts_without_total() {
        let mut listener = LoggingProgress.progress_for_part("empty", 0);
        listener.add(5);
        listener.done();
    }

    #[test]
    fn test_listener_trait_object() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut listener: Box<dyn ProgressListener> = Box::new(Recording {
            events: events.clone(),
        });
        listener.add(1);
        listener.add(1);
        listener.done();
        assert_eq!(*events.lock(), vec![1, 1, 0]);
    }
}

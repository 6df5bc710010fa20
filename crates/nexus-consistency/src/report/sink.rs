//! Destinations for reported inconsistencies

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{ConsistencySummaryStatistics, Inconsistency, RecordType, Severity};
use crate::error::Result;

/// Receives every inconsistency once, from any worker thread
pub trait InconsistencySink: Send + Sync {
    /// Record one inconsistency
    fn log(&self, inconsistency: &Inconsistency);

    /// Flush buffered output
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Logs through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl InconsistencySink for TracingSink {
    fn log(&self, inconsistency: &Inconsistency) {
        let record_type = inconsistency.record_type.name();
        match inconsistency.severity() {
            Severity::Error => tracing::error!(
                record_type,
                id = inconsistency.id,
                "{}",
                inconsistency.kind
            ),
            Severity::Warning => tracing::warn!(
                record_type,
                id = inconsistency.id,
                "{}",
                inconsistency.kind
            ),
        }
    }
}

/// Keeps everything in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<Inconsistency>>,
}

impl MemorySink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far
    pub fn inconsistencies(&self) -> Vec<Inconsistency> {
        self.entries.lock().clone()
    }

    /// Entries filed against one record type
    pub fn for_record_type(&self, record_type: RecordType) -> Vec<Inconsistency> {
        self.entries
            .lock()
            .iter()
            .filter(|i| i.record_type == record_type)
            .cloned()
            .collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// No entries received
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl InconsistencySink for MemorySink {
    fn log(&self, inconsistency: &Inconsistency) {
        self.entries.lock().push(inconsistency.clone());
    }
}

/// Writes one line per inconsistency to a report file
///
/// The first write error stops further output and is returned by
/// [`flush`](InconsistencySink::flush), so a truncated report never reads
/// as complete.
pub struct ReportFileSink {
    path: PathBuf,
    writer: Mutex<ReportWriter>,
}

struct ReportWriter {
    out: BufWriter<Box<dyn Write + Send>>,
    failure: Option<std::io::Error>,
}

impl ReportWriter {
    fn check_failure(&self) -> std::io::Result<()> {
        match &self.failure {
            Some(e) => Err(std::io::Error::new(e.kind(), e.to_string())),
            None => Ok(()),
        }
    }
}

impl ReportFileSink {
    /// Create (truncate) a report file
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        tracing::info!("Writing inconsistency report to {:?}", path);
        Ok(Self::with_writer(path, Box::new(file)))
    }

    fn with_writer(path: PathBuf, out: Box<dyn Write + Send>) -> Self {
        Self {
            path,
            writer: Mutex::new(ReportWriter {
                out: BufWriter::new(out),
                failure: None,
            }),
        }
    }

    /// Create a timestamped report file inside `dir`
    pub fn create_in(dir: impl AsRef<Path>) -> Result<Self> {
        Self::create(dir.as_ref().join(Self::default_file_name()))
    }

    /// `inconsistencies-<timestamp>.report`
    pub fn default_file_name() -> String {
        format!(
            "inconsistencies-{}.report",
            chrono::Utc::now().format("%Y-%m-%d.%H.%M.%S")
        )
    }

    /// Report file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the summary as a JSON line
    pub fn write_summary(&self, summary: &ConsistencySummaryStatistics) -> Result<()> {
        let json = serde_json::to_string(summary)
            .map_err(|e| crate::Error::internal(format!("failed to encode summary: {}", e)))?;
        let mut writer = self.writer.lock();
        writer.check_failure()?;
        writeln!(writer.out, "{}", json)?;
        writer.out.flush()?;
        Ok(())
    }
}

impl InconsistencySink for ReportFileSink {
    fn log(&self, inconsistency: &Inconsistency) {
        let mut writer = self.writer.lock();
        if writer.failure.is_some() {
            return;
        }
        if let Err(e) = writeln!(writer.out, "{}", inconsistency) {
            tracing::error!("Failed to write inconsistency to {:?}: {}", self.path, e);
            writer.failure = Some(e);
        }
    }

    fn flush(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.check_failure()?;
        writer.out.flush()?;
        Ok(())
    }
}

/// Forwards to several sinks
pub struct FanOutSink {
    sinks: Vec<Arc<dyn InconsistencySink>>,
}

impl FanOutSink {
    /// Combine sinks
    pub fn new(sinks: Vec<Arc<dyn InconsistencySink>>) -> Self {
        Self { sinks }
    }
}

impl InconsistencySink for FanOutSink {
    fn log(&self, inconsistency: &Inconsistency) {
        for sink in &self.sinks {
            sink.log(inconsistency);
        }
    }

    fn flush(&self) -> Result<()> {
        for sink in &self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::InconsistencyKind;

    fn sample() -> Inconsistency {
        Inconsistency::new(
            RecordType::Node,
            7,
            InconsistencyKind::LabelNotInUse { label: 3 },
        )
    }

    #[test]
    fn test_memory_sink_filters_by_type() {
        let sink = MemorySink::new();
        sink.log(&sample());
        assert_eq!(sink.for_record_type(RecordType::Node).len(), 1);
        assert!(sink.for_record_type(RecordType::Property).is_empty());
    }

    #[test]
    fn test_report_file_sink_writes_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ReportFileSink::create_in(dir.path()).unwrap();
        sink.log(&sample());
        let summary = ConsistencySummaryStatistics::new();
        summary.add(RecordType::Node, Severity::Error);
        sink.write_summary(&summary).unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ERROR: NODE[7]"));
        assert!(lines[1].contains("\"errors\":1"));
        let file_name = sink.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with("inconsistencies-"));
    }

    /// Accepts `capacity` bytes, then fails every write
    struct FullDisk {
        capacity: usize,
    }

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if buf.len() > self.capacity {
                return Err(std::io::Error::other("no space left on device"));
            }
            self.capacity -= buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_report_file_sink_keeps_first_write_error() {
        let sink = ReportFileSink::with_writer(
            PathBuf::from("full.report"),
            Box::new(FullDisk { capacity: 100 }),
        );
        // enough lines to overflow the write buffer
        for _ in 0..1_000 {
            sink.log(&sample());
        }
        let err = sink.flush().unwrap_err();
        assert!(matches!(err, crate::error::Error::Io(_)), "{:?}", err);
        assert!(
            sink.write_summary(&ConsistencySummaryStatistics::new())
                .is_err()
        );
    }

    #[test]
    fn test_fan_out_reaches_every_sink() {
        let a = Arc::new(MemorySink::new());
        let b = Arc::new(MemorySink::new());
        let fan_out = FanOutSink::new(vec![a.clone(), b.clone()]);
        fan_out.log(&sample());
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }
}

//! Single-threaded scanning

use std::sync::Arc;

use super::{QueueScope, RecordProcessor, StopControl};
use crate::error::{Error, Result};
use crate::progress::ProgressMonitorFactory;
use crate::store::BoundedIterable;

/// Feeds every record straight to the processor on the calling thread
pub struct SequentialRecordScanner<'a, R> {
    name: String,
    records: BoundedIterable<'a, R>,
    processor: Arc<dyn RecordProcessor<R>>,
    stop: StopControl,
}

impl<'a, R> SequentialRecordScanner<'a, R> {
    /// Scanner over `records`
    pub fn new(
        name: impl Into<String>,
        records: BoundedIterable<'a, R>,
        processor: Arc<dyn RecordProcessor<R>>,
        stop: StopControl,
    ) -> Self {
        Self {
            name: name.into(),
            records,
            processor,
            stop,
        }
    }

    /// Process every record. The iterator and the processor are closed on
    /// every exit path.
    pub fn run(self, progress: &dyn ProgressMonitorFactory) -> Result<()> {
        let Self {
            name,
            records,
            processor,
            stop,
        } = self;
        let mut listener = progress.progress_for_part(&name, records.max_count());
        let scope = QueueScope::all(0);

        processor.init(0);
        let result = (|| {
            for record in records {
                if stop.is_stopped() {
                    return Err(Error::Cancelled);
                }
                processor.process(&record?, &scope)?;
                listener.add(1);
            }
            Ok(())
        })();
        processor.close();
        listener.done();
        result
    }
}

//! Multi-threaded scanning through the worker pool

use std::sync::Arc;
use std::time::Duration;

use super::{QueueDistributor, RecordProcessor, StopControl, Workers};
use crate::error::{Error, Result};
use crate::progress::ProgressMonitorFactory;
use crate::store::BoundedIterable;

/// Worker pool sizing for one parallel scan
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    /// Worker (and queue) count
    pub threads: usize,
    /// Capacity of each queue
    pub queue_capacity: usize,
    /// Queue poll interval
    pub poll: Duration,
    /// Stop-path timeout
    pub drop_dead: Duration,
}

/// Pushes distributed records onto worker queues; blocking here is the
/// backpressure point of a parallel scan
struct RecordDistributor<'w, R> {
    workers: &'w Workers<R>,
    halted: bool,
}

impl<R: Clone + Send + 'static> RecordDistributor<'_, R> {
    fn push(&mut self, record: &R, queue: usize) -> Result<()> {
        if self.halted {
            return Ok(());
        }
        if !self.workers.send(queue, record.clone())? {
            self.halted = true;
        }
        Ok(())
    }
}

/// Scans on the calling thread and processes on `threads` workers
pub struct ParallelRecordScanner<'a, R, D> {
    name: String,
    records: BoundedIterable<'a, R>,
    processor: Arc<dyn RecordProcessor<R>>,
    distributor: D,
    settings: WorkerSettings,
    stop: StopControl,
}

impl<'a, R, D> ParallelRecordScanner<'a, R, D>
where
    R: Clone + Send + 'static,
    D: QueueDistributor<R>,
{
    /// Scanner over `records`
    pub fn new(
        name: impl Into<String>,
        records: BoundedIterable<'a, R>,
        processor: Arc<dyn RecordProcessor<R>>,
        distributor: D,
        settings: WorkerSettings,
        stop: StopControl,
    ) -> Self {
        Self {
            name: name.into(),
            records,
            processor,
            distributor,
            settings,
            stop,
        }
    }

    /// Distribute every record, then drain and stop the workers. The
    /// processor is closed exactly once, after every worker exited.
    pub fn run(self, progress: &dyn ProgressMonitorFactory) -> Result<()> {
        let Self {
            name,
            records,
            processor,
            mut distributor,
            settings,
            stop,
        } = self;
        let threads = settings.threads.max(1);
        let scopes = (0..threads).map(|q| distributor.scope_for(q)).collect();
        let workers = Workers::start(
            &name,
            scopes,
            settings.queue_capacity,
            settings.poll,
            settings.drop_dead,
            processor.clone(),
        )?;
        let mut listener = progress.progress_for_part(&name, records.max_count());

        let mut outcome = Ok(());
        {
            let mut sink = RecordDistributor {
                workers: &workers,
                halted: false,
            };
            for record in records {
                if stop.is_stopped() {
                    outcome = Err(Error::Cancelled);
                    break;
                }
                if sink.halted || workers.is_halted() {
                    break;
                }
                let record = match record {
                    Ok(record) => record,
                    Err(e) => {
                        outcome = Err(e);
                        break;
                    }
                };
                if let Err(e) = distributor.distribute(&record, &mut |r, q| sink.push(r, q)) {
                    outcome = Err(e);
                    break;
                }
                listener.add(1);
            }
        }

        if outcome.is_err() {
            workers.done();
        }
        let drained = workers.drain_and_await();
        processor.close();
        listener.done();
        outcome.and(drained)
    }
}

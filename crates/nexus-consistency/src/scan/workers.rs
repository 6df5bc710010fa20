//! Worker pool: one long-lived thread per queue
//!
//! Each worker moves through `Created -> Initializing -> Running ->
//! Draining -> Done`. `init` runs in strictly increasing worker id order:
//! a worker blocks in [`InitSequencer::wait_turn`] until every lower id has
//! finished its own `init`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, bounded};
use parking_lot::{Condvar, Mutex};

use super::{QueueScope, RecordProcessor};
use crate::error::{Error, Result};

/// Lifecycle of one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Thread spawned, not yet started
    Created = 0,
    /// Waiting for its init turn or running `init`
    Initializing = 1,
    /// Processing records
    Running = 2,
    /// No more records will arrive; finishing the queue
    Draining = 3,
    /// Exited
    Done = 4,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Initializing,
            2 => Self::Running,
            3 => Self::Draining,
            _ => Self::Done,
        }
    }
}

/// Orders `init` calls by worker id
#[derive(Debug, Default)]
pub struct InitSequencer {
    next: Mutex<usize>,
    turn: Condvar,
}

impl InitSequencer {
    /// Sequencer starting at worker 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `worker_id` may initialize. Returns false when `halt` was
    /// raised while waiting.
    pub fn wait_turn(&self, worker_id: usize, halt: &AtomicBool, poll: Duration) -> bool {
        let mut next = self.next.lock();
        while *next < worker_id {
            if halt.load(Ordering::Acquire) {
                return false;
            }
            self.turn.wait_for(&mut next, poll);
        }
        true
    }

    /// Mark `worker_id` initialized and wake the next one
    pub fn complete(&self, worker_id: usize) {
        let mut next = self.next.lock();
        if *next <= worker_id {
            *next = worker_id + 1;
        }
        self.turn.notify_all();
    }
}

struct Shared {
    states: Vec<AtomicU8>,
    halt: AtomicBool,
    end_of_input: AtomicBool,
    sequencer: InitSequencer,
}

impl Shared {
    fn set_state(&self, worker: usize, state: WorkerState) {
        self.states[worker].store(state as u8, Ordering::Release);
    }

    fn state(&self, worker: usize) -> WorkerState {
        WorkerState::from_u8(self.states[worker].load(Ordering::Acquire))
    }

    fn is_halted(&self) -> bool {
        self.halt.load(Ordering::Acquire)
    }
}

/// Marks the worker done on every exit path, and halts the pool on panic
struct ExitGuard {
    shared: Arc<Shared>,
    worker: usize,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            self.shared.halt.store(true, Ordering::Release);
            self.shared.sequencer.complete(self.worker);
        }
        self.shared.set_state(self.worker, WorkerState::Done);
    }
}

/// A pool of workers, each draining its own bounded queue
pub struct Workers<R> {
    name: String,
    senders: Vec<Sender<R>>,
    handles: Vec<JoinHandle<()>>,
    completions: Receiver<(usize, Result<()>)>,
    shared: Arc<Shared>,
    poll: Duration,
    drop_dead: Duration,
}

impl<R: Send + 'static> Workers<R> {
    /// Spawn one worker per scope; `scopes[i]` is what worker `i` owns
    pub fn start(
        name: &str,
        scopes: Vec<QueueScope>,
        queue_capacity: usize,
        poll: Duration,
        drop_dead: Duration,
        processor: Arc<dyn RecordProcessor<R>>,
    ) -> Result<Self> {
        let count = scopes.len();
        let shared = Arc::new(Shared {
            states: (0..count)
                .map(|_| AtomicU8::new(WorkerState::Created as u8))
                .collect(),
            halt: AtomicBool::new(false),
            end_of_input: AtomicBool::new(false),
            sequencer: InitSequencer::new(),
        });
        let (done_tx, completions) = bounded(count.max(1));
        let mut senders = Vec::with_capacity(count);
        let mut handles = Vec::with_capacity(count);

        for (worker, scope) in scopes.into_iter().enumerate() {
            let (tx, rx) = bounded::<R>(queue_capacity.max(1));
            senders.push(tx);
            let worker_shared = shared.clone();
            let processor = processor.clone();
            let done_tx = done_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("{}-worker-{}", name, worker))
                .spawn(move || {
                    let result = run_worker(
                        worker,
                        rx,
                        &worker_shared,
                        processor.as_ref(),
                        &scope,
                        poll,
                    );
                    let _ = done_tx.send((worker, result));
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    shared.halt.store(true, Ordering::Release);
                    return Err(Error::worker(format!(
                        "failed to spawn {} worker {}: {}",
                        name, worker, e
                    )));
                }
            }
        }

        Ok(Self {
            name: name.to_string(),
            senders,
            handles,
            completions,
            shared,
            poll,
            drop_dead,
        })
    }

    /// Number of workers
    pub fn count(&self) -> usize {
        self.handles.len()
    }

    /// Current state of a worker
    pub fn state(&self, worker: usize) -> WorkerState {
        self.shared.state(worker)
    }

    /// A worker failed or stop was requested
    pub fn is_halted(&self) -> bool {
        self.shared.is_halted()
    }

    /// Ask every worker to stop after its current record
    pub fn done(&self) {
        self.shared.halt.store(true, Ordering::Release);
    }

    /// Push a record onto a queue, blocking while it is full. Returns false
    /// when the pool halted before the record could be queued.
    pub fn send(&self, queue: usize, record: R) -> Result<bool> {
        let sender = self
            .senders
            .get(queue)
            .ok_or_else(|| Error::internal(format!("queue {} out of range", queue)))?;
        let mut record = record;
        loop {
            match sender.send_timeout(record, self.poll) {
                Ok(()) => return Ok(true),
                Err(SendTimeoutError::Timeout(back)) => {
                    if self.is_halted() {
                        return Ok(false);
                    }
                    record = back;
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    if self.is_halted() {
                        return Ok(false);
                    }
                    return Err(Error::worker(format!(
                        "{} worker {} exited early",
                        self.name, queue
                    )));
                }
            }
        }
    }

    /// Signal end of input, wait for every worker and surface the first failure
    pub fn drain_and_await(mut self) -> Result<()> {
        self.shared.end_of_input.store(true, Ordering::Release);
        self.senders.clear();

        let count = self.handles.len();
        let mut finished = vec![false; count];
        let mut first_error: Option<Error> = None;
        let mut halted_at: Option<Instant> = None;

        while finished.iter().any(|done| !done) {
            match self.completions.recv_timeout(self.poll) {
                Ok((worker, result)) => {
                    finished[worker] = true;
                    if let Err(e) = result {
                        first_error.get_or_insert(e);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if !self.is_halted() {
                        continue;
                    }
                    let since = *halted_at.get_or_insert_with(Instant::now);
                    if since.elapsed() >= self.drop_dead {
                        let worker = finished.iter().position(|done| !done).unwrap_or(0);
                        tracing::error!(
                            "{} worker {} did not stop within {:?}",
                            self.name,
                            worker,
                            self.drop_dead
                        );
                        return Err(first_error.unwrap_or(Error::WorkerTimeout {
                            worker,
                            timeout: self.drop_dead,
                        }));
                    }
                }
                // Every remaining worker died without reporting.
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        for (worker, handle) in std::mem::take(&mut self.handles).into_iter().enumerate() {
            if handle.join().is_err() {
                tracing::error!("{} worker {} panicked", self.name, worker);
                first_error.get_or_insert_with(|| {
                    Error::worker(format!("{} worker {} panicked", self.name, worker))
                });
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<R> Drop for Workers<R> {
    fn drop(&mut self) {
        // Threads still running here belong to an abandoned pool.
        self.shared.end_of_input.store(true, Ordering::Release);
        self.shared.halt.store(true, Ordering::Release);
    }
}

fn run_worker<R>(
    worker: usize,
    queue: Receiver<R>,
    shared: &Arc<Shared>,
    processor: &dyn RecordProcessor<R>,
    scope: &QueueScope,
    poll: Duration,
) -> Result<()> {
    let _guard = ExitGuard {
        shared: shared.clone(),
        worker,
    };

    shared.set_state(worker, WorkerState::Initializing);
    if !shared.sequencer.wait_turn(worker, &shared.halt, poll) {
        return Ok(());
    }
    processor.init(worker);
    shared.sequencer.complete(worker);
    shared.set_state(worker, WorkerState::Running);

    loop {
        if shared.is_halted() {
            return Ok(());
        }
        if shared.end_of_input.load(Ordering::Acquire)
            && shared.state(worker) == WorkerState::Running
        {
            shared.set_state(worker, WorkerState::Draining);
        }
        match queue.recv_timeout(poll) {
            Ok(record) => {
                if let Err(e) = processor.process(&record, scope) {
                    shared.halt.store(true, Ordering::Release);
                    return Err(e);
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }
}

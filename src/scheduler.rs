//! Fixed-size worker pool with a bounded queue, and the latch used to join
//! a wave of work units.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::error::ScheduleError;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    sender: Option<SyncSender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `threads` workers sharing a queue of `queue_capacity` jobs.
    pub fn new(threads: usize, queue_capacity: usize) -> Self {
        let threads = threads.max(1);
        let (sender, receiver) = sync_channel::<Job>(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..threads)
            .filter_map(|i| {
                let receiver = Arc::clone(&receiver);
                thread::Builder::new()
                    .name(format!("cutlist-worker-{i}"))
                    .spawn(move || worker_loop(receiver))
                    .map_err(|e| tracing::error!(error = %e, "failed to spawn worker thread"))
                    .ok()
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
        }
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Queues `job` without blocking. A full queue hands the job back.
    pub fn try_execute(&self, job: Job) -> Result<(), ScheduleError> {
        let Some(sender) = &self.sender else {
            return Err(ScheduleError::ShutDown(job));
        };
        sender.try_send(job).map_err(|e| match e {
            TrySendError::Full(job) => ScheduleError::QueueFull(job),
            TrySendError::Disconnected(job) => ScheduleError::ShutDown(job),
        })
    }

    /// Queues `job`, waiting for queue space if needed.
    pub fn execute(&self, job: Job) -> Result<(), ScheduleError> {
        let Some(sender) = &self.sender else {
            return Err(ScheduleError::ShutDown(job));
        };
        sender.send(job).map_err(|e| ScheduleError::ShutDown(e.0))
    }
}

fn worker_loop(receiver: Arc<Mutex<Receiver<Job>>>) {
    loop {
        let next = match receiver.lock() {
            Ok(guard) => guard.recv(),
            Err(_) => return,
        };
        let Ok(job) = next else {
            return;
        };
        // A panicking unit must not take the worker down with it.
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::error!("work unit panicked");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel makes every idle worker return.
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
    }
}

/// Countdown of outstanding work units of one wave.
#[derive(Debug, Default)]
pub struct WaveLatch {
    remaining: Mutex<usize>,
    drained: Condvar,
}

impl WaveLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, n: usize) {
        let mut remaining = self.remaining.lock().unwrap_or_else(|e| e.into_inner());
        *remaining += n;
    }

    pub fn done(&self) {
        let mut remaining = self.remaining.lock().unwrap_or_else(|e| e.into_inner());
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.drained.notify_all();
        }
    }

    pub fn remaining(&self) -> usize {
        *self.remaining.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Blocks until every added unit is done.
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock().unwrap_or_else(|e| e.into_inner());
        while *remaining > 0 {
            remaining = self
                .drained
                .wait(remaining)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Marks one unit done when dropped, even if the unit panics.
    pub fn guard(self: &Arc<Self>) -> LatchGuard {
        LatchGuard(Arc::clone(self))
    }
}

pub struct LatchGuard(Arc<WaveLatch>);

impl Drop for LatchGuard {
    fn drop(&mut self) {
        self.0.done();
    }
}

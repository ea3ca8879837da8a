use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use anyhow::{anyhow, Result};
use crossbeam::channel::{unbounded, Receiver, Sender};
use log::{debug, error, info};

use crate::error::DdcError;

type JobAction = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// A named unit of work for the [`WorkerPool`].
pub struct Job {
    name: String,
    action: JobAction,
}

impl Job {
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            action: Box::new(action),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Default)]
struct JobCounters {
    pending: usize,
    total: usize,
}

/// Fixed-size pool of OS threads draining a shared job queue.
///
/// Jobs are queued with [`add_job`](Self::add_job) and only start running once
/// [`process_and_wait`](Self::process_and_wait) is called. A failing job is
/// logged and counted as done; it never stops the other jobs. The pool is
/// single-use: once drained its queue is closed.
pub struct WorkerPool {
    worker_count: usize,
    logging_frequency: usize,
    sender: Option<Sender<Job>>,
    receiver: Receiver<Job>,
    counters: Arc<Mutex<JobCounters>>,
}

impl WorkerPool {
    /// Create a pool of `worker_count` workers.
    ///
    /// `logging_frequency` controls how often aggregate progress is logged;
    /// zero disables progress lines.
    pub fn new(worker_count: usize, logging_frequency: usize) -> Result<Self> {
        if worker_count == 0 {
            return Err(DdcError::InvalidConfig("worker pool needs at least one worker".to_string()).into());
        }

        let (sender, receiver) = unbounded();
        Ok(Self {
            worker_count,
            logging_frequency,
            sender: Some(sender),
            receiver,
            counters: Arc::new(Mutex::new(JobCounters::default())),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Queue a job. Never blocks.
    pub fn add_job(&self, job: Job) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| anyhow!("worker pool already drained, cannot queue job '{}'", job.name))?;

        {
            let mut counters = lock(&self.counters);
            counters.pending += 1;
            counters.total += 1;
        }

        if let Err(e) = sender.send(job) {
            let mut counters = lock(&self.counters);
            counters.pending -= 1;
            counters.total -= 1;
            return Err(anyhow!("failed to queue job '{}'", e.into_inner().name));
        }
        Ok(())
    }

    pub fn pending_jobs(&self) -> usize {
        lock(&self.counters).pending
    }

    pub fn total_jobs(&self) -> usize {
        lock(&self.counters).total
    }

    /// Run every queued job on `worker_count` threads and block until all of
    /// them have finished.
    pub fn process_and_wait(&mut self) -> Result<()> {
        if self.pending_jobs() == 0 {
            return Err(DdcError::NoPendingJobs.into());
        }

        // Every job is already queued, so dropping the sender lets workers
        // exit as soon as the queue runs dry.
        drop(self.sender.take());

        let start = Instant::now();
        let workers = (0..self.worker_count)
            .map(|i| {
                let receiver = self.receiver.clone();
                let counters = Arc::clone(&self.counters);
                let logging_frequency = self.logging_frequency;

                std::thread::Builder::new()
                    .name(format!("ddc-worker-{}", i))
                    .spawn(move || worker_loop(i, receiver, counters, logging_frequency))
                    .map_err(|e| anyhow!("failed to spawn worker {}: {}", i, e))
            })
            .collect::<Vec<_>>();

        let mut spawned = 0;
        for worker in workers {
            match worker {
                Ok(handle) => {
                    spawned += 1;
                    if handle.join().is_err() {
                        error!("worker thread panicked outside of a job");
                    }
                }
                Err(e) => error!("{}", e),
            }
        }

        if spawned == 0 {
            return Err(anyhow!("no worker threads could be started"));
        }

        // A partial spawn failure still drains the queue with fewer workers.
        let total = self.total_jobs();
        info!("worker pool finished {} jobs in {:?}", total, start.elapsed());
        Ok(())
    }
}

fn worker_loop(
    id: usize,
    receiver: Receiver<Job>,
    counters: Arc<Mutex<JobCounters>>,
    logging_frequency: usize,
) {
    while let Ok(job) = receiver.recv() {
        let Job { name, action } = job;
        debug!("worker {} starting job {}", id, name);
        let start = Instant::now();

        match panic::catch_unwind(AssertUnwindSafe(action)) {
            Ok(Ok(())) => debug!("job {} completed in {:?}", name, start.elapsed()),
            Ok(Err(e)) => error!("job {} failed: {:#}", name, e),
            Err(_) => error!("job {} panicked", name),
        }

        let (pending, total) = {
            let mut counters = lock(&counters);
            counters.pending -= 1;
            (counters.pending, counters.total)
        };

        let completed = total - pending;
        if logging_frequency > 0 && completed % logging_frequency == 0 {
            info!("{}/{} jobs completed", completed, total);
        }
    }
}

fn lock(counters: &Mutex<JobCounters>) -> MutexGuard<'_, JobCounters> {
    counters.lock().unwrap_or_else(PoisonError::into_inner)
}

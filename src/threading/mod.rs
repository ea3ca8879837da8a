//! Concurrency primitives shared by the orchestration stages.
//!
//! - [`pool::WorkerPool`]: fixed number of OS threads draining a queue of named jobs
//! - [`semaphore::Semaphore`]: blocking permit counter gating node tarball transfers

pub mod pool;
pub mod semaphore;

pub use pool::{Job, WorkerPool};
pub use semaphore::{Semaphore, SemaphorePermit};

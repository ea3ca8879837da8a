use anyhow::{anyhow, Result};
use crossbeam::channel::{bounded, Receiver, Sender};

use crate::error::DdcError;

/// Blocking counting semaphore backed by a channel of permit tokens.
pub struct Semaphore {
    permits: usize,
    give: Sender<()>,
    take: Receiver<()>,
}

/// Returns its token to the semaphore when dropped.
pub struct SemaphorePermit<'a> {
    semaphore: &'a Semaphore,
}

impl Semaphore {
    pub fn new(permits: usize) -> Result<Self> {
        if permits == 0 {
            return Err(DdcError::InvalidConfig("semaphore needs at least one permit".to_string()).into());
        }

        let (give, take) = bounded(permits);
        for _ in 0..permits {
            give.send(()).map_err(|_| anyhow!("failed to seed semaphore permits"))?;
        }
        Ok(Self { permits, give, take })
    }

    /// Block until a permit is free.
    pub fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        self.take
            .recv()
            .map_err(|_| anyhow!("semaphore closed while waiting for a permit"))?;
        Ok(SemaphorePermit { semaphore: self })
    }

    pub fn available_permits(&self) -> usize {
        self.take.len()
    }

    pub fn permits(&self) -> usize {
        self.permits
    }
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        // Capacity equals the permit count, so this never blocks.
        let _ = self.semaphore.give.send(());
    }
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("All {capacity} execution slots busy and wait queue full (limit {queue_limit})")]
    AtCapacity { capacity: usize, queue_limit: usize },

    #[error("Scheduler is shut down")]
    ShutDown,
}

/// Bounds how many submissions execute at once.
///
/// Capacity is a fixed configured number of parallel slots, matching how
/// many environments the host can safely run; it is never auto-detected.
/// When all slots are busy, admissions wait in FIFO order up to
/// `queue_limit`; anything beyond that is rejected immediately instead of
/// queueing unboundedly.
pub struct ExecutionScheduler {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    queue_limit: usize,
    waiting: AtomicUsize,
}

/// One held execution slot; dropping it readmits the next waiter.
#[derive(Debug)]
pub struct ExecutionSlot {
    _permit: OwnedSemaphorePermit,
}

impl ExecutionScheduler {
    pub fn new(capacity: usize, queue_limit: usize) -> Self {
        ExecutionScheduler {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            queue_limit,
            waiting: AtomicUsize::new(0),
        }
    }

    pub async fn admit(&self) -> Result<ExecutionSlot, SchedulerError> {
        if let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() {
            return Ok(ExecutionSlot { _permit: permit });
        }

        let waiting = self.waiting.fetch_add(1, Ordering::SeqCst);
        if waiting >= self.queue_limit {
            self.waiting.fetch_sub(1, Ordering::SeqCst);
            return Err(SchedulerError::AtCapacity {
                capacity: self.capacity,
                queue_limit: self.queue_limit,
            });
        }

        let result = Arc::clone(&self.semaphore).acquire_owned().await;
        self.waiting.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(permit) => Ok(ExecutionSlot { _permit: permit }),
            Err(_) => Err(SchedulerError::ShutDown),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }
}

//! Bounded worker pool
//!
//! Workers are tokens: holding one entitles the dispatcher to run one
//! iteration. Idle workers wait in a channel; a finished iteration sends its
//! worker back. New workers are allocated lazily up to the hard maximum.

use crate::error::{ScheduleError, ScheduleResult};
use tokio::sync::mpsc;

/// A unit of iteration capacity
#[derive(Debug, PartialEq, Eq)]
pub struct Worker {
    id: usize,
    iterations: u64,
}

impl Worker {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Iterations this worker has started
    pub fn iterations(&self) -> u64 {
        self.iterations
    }
}

/// Sends workers back to their pool
#[derive(Debug, Clone)]
pub struct WorkerReturn {
    sender: mpsc::UnboundedSender<Worker>,
}

impl WorkerReturn {
    pub fn release(&self, worker: Worker) {
        // The pool owns a sender too, so the channel is open while it lives
        let _ = self.sender.send(worker);
    }
}

#[derive(Debug)]
pub struct WorkerPool {
    idle: mpsc::UnboundedReceiver<Worker>,
    returns: WorkerReturn,
    allocated: usize,
    max: usize,
}

impl WorkerPool {
    /// Create a pool with `pre_allocated` idle workers and a hard `max`
    pub fn new(pre_allocated: usize, max: usize) -> ScheduleResult<Self> {
        if max == 0 || pre_allocated > max {
            return Err(ScheduleError::InvalidWorkers { pre_allocated, max });
        }
        let (sender, idle) = mpsc::unbounded_channel();
        let mut pool = Self {
            idle,
            returns: WorkerReturn { sender },
            allocated: 0,
            max,
        };
        for _ in 0..pre_allocated {
            let worker = pool.allocate();
            pool.returns.release(worker);
        }
        Ok(pool)
    }

    fn allocate(&mut self) -> Worker {
        let worker = Worker {
            id: self.allocated,
            iterations: 0,
        };
        self.allocated += 1;
        worker
    }

    fn checkout(mut worker: Worker) -> Worker {
        worker.iterations += 1;
        worker
    }

    /// Idle worker, or a new one while under the maximum
    pub fn try_acquire(&mut self) -> Option<Worker> {
        if let Ok(worker) = self.idle.try_recv() {
            return Some(Self::checkout(worker));
        }
        if self.allocated < self.max {
            let worker = self.allocate();
            return Some(Self::checkout(worker));
        }
        None
    }

    /// Wait for a worker to be returned
    pub async fn acquire(&mut self) -> Worker {
        if let Some(worker) = self.try_acquire() {
            return worker;
        }
        loop {
            if let Some(worker) = self.idle.recv().await {
                return Self::checkout(worker);
            }
        }
    }

    pub fn returns(&self) -> WorkerReturn {
        self.returns.clone()
    }

    /// Workers allocated so far, idle or busy
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_pre_allocation_and_growth() {
        let mut pool = WorkerPool::new(2, 3).unwrap();
        assert_eq!(pool.allocated(), 2);

        let a = pool.try_acquire().unwrap();
        let b = pool.try_acquire().unwrap();
        assert_eq!(pool.allocated(), 2);

        let c = pool.try_acquire().unwrap();
        assert_eq!(pool.allocated(), 3);
        assert!(pool.try_acquire().is_none());

        let ids = [a.id(), b.id(), c.id()];
        assert_eq!(ids, [0, 1, 2]);
    }

    #[test]
    fn test_returned_worker_is_reused() {
        let mut pool = WorkerPool::new(1, 1).unwrap();
        let worker = pool.try_acquire().unwrap();
        assert!(pool.try_acquire().is_none());

        pool.returns().release(worker);
        let again = pool.try_acquire().unwrap();
        assert_eq!(again.id(), 0);
        assert_eq!(again.iterations(), 2);
    }

    #[test]
    fn test_invalid_sizes() {
        assert!(WorkerPool::new(3, 2).is_err());
        assert!(WorkerPool::new(0, 0).is_err());
        assert!(WorkerPool::new(0, 1).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_release() {
        let mut pool = WorkerPool::new(1, 1).unwrap();
        let worker = pool.try_acquire().unwrap();
        let returns = pool.returns();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            returns.release(worker);
        });

        let started = tokio::time::Instant::now();
        let worker = pool.acquire().await;
        assert_eq!(worker.id(), 0);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}

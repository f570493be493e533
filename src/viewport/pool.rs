//! Work-stealing tile dispatch (§5): one `crossbeam_deque::Worker` per
//! thread, `Stealer` handles shared for idle-thread stealing, replacing the
//! teacher's `threadpool.rs`/`thread.rs` ad hoc `Vec`-of-jobs-plus-mutex
//! dispatch with a lock-free deque. `Drop` joins every worker (§5).

use crossbeam_deque::{Injector, Steal, Stealer, Worker};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::{RenderError, RenderResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct ThreadPool {
    injector: Arc<Injector<Job>>,
    handles: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    pending: Arc<AtomicUsize>,
}

impl ThreadPool {
    pub fn new(num_threads: usize) -> RenderResult<Self> {
        if num_threads == 0 {
            return Err(RenderError::Configuration(
                "thread pool requires at least one thread".to_string(),
            ));
        }

        let injector = Arc::new(Injector::new());
        let workers: Vec<Worker<Job>> = (0..num_threads).map(|_| Worker::new_fifo()).collect();
        let stealers: Vec<Stealer<Job>> = workers.iter().map(Worker::stealer).collect();
        let shutdown = Arc::new(AtomicBool::new(false));
        let pending = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(num_threads);
        for worker in workers {
            let injector = Arc::clone(&injector);
            let stealers = stealers.clone();
            let shutdown = Arc::clone(&shutdown);
            let pending = Arc::clone(&pending);
            handles.push(thread::spawn(move || worker_loop(worker, &injector, &stealers, &shutdown, &pending)));
        }

        Ok(ThreadPool { injector, handles, shutdown, pending })
    }

    /// Schedules `job` to run on some worker (§5's single `parallel-for`
    /// primitive). A panic inside `job` is caught so one bad tile doesn't
    /// take down the pool.
    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.injector.push(Box::new(job));
    }

    /// Blocks until every job dispatched so far has completed (§5's
    /// inter-pass barrier: workers may suspend only here).
    pub fn barrier(&self) {
        while self.pending.load(Ordering::SeqCst) > 0 {
            thread::yield_now();
        }
    }

    pub fn num_threads(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.barrier();
        self.shutdown.store(true, Ordering::SeqCst);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    local: Worker<Job>,
    injector: &Injector<Job>,
    stealers: &[Stealer<Job>],
    shutdown: &AtomicBool,
    pending: &AtomicUsize,
) {
    loop {
        match find_job(&local, injector, stealers) {
            Some(job) => {
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    log::error!("tile job panicked; continuing with remaining tiles");
                }
                pending.fetch_sub(1, Ordering::SeqCst);
            }
            None => {
                if shutdown.load(Ordering::SeqCst) {
                    return;
                }
                thread::yield_now();
            }
        }
    }
}

/// The standard `crossbeam_deque` retrieval order: own queue first, then a
/// batch steal from the injector, then round-robin stealing from peers.
fn find_job(local: &Worker<Job>, injector: &Injector<Job>, stealers: &[Stealer<Job>]) -> Option<Job> {
    local.pop().or_else(|| {
        std::iter::repeat_with(|| {
            injector
                .steal_batch_and_pop(local)
                .or_else(|| stealers.iter().map(Stealer::steal).collect())
        })
        .find(|s| !s.is_retry())
        .and_then(Steal::success)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn every_dispatched_job_runs_exactly_once() {
        let pool = ThreadPool::new(4).unwrap();
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..500 {
            let counter = Arc::clone(&counter);
            pool.dispatch(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.barrier();
        assert_eq!(counter.load(Ordering::SeqCst), 500);
    }

    #[test]
    fn a_panicking_job_does_not_stop_the_pool() {
        let pool = ThreadPool::new(2).unwrap();
        let counter = Arc::new(AtomicU32::new(0));

        pool.dispatch(|| panic!("deliberate failure for isolation test"));
        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.dispatch(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.barrier();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn zero_threads_is_rejected() {
        assert!(ThreadPool::new(0).is_err());
    }
}

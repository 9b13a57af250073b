//! A resizable pool of worker threads.
//!
//! With zero workers every job runs on the calling thread before
//! [`ThreadPool::execute`] returns. Resizing is only allowed while the job
//! queue is empty.

use crate::error::RuntimeError;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use tempo_config::RuntimeConfig;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct PoolState {
    jobs: VecDeque<Job>,
    running: usize,
    shutdown: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<PoolState>,
    work: Condvar,
    idle: Condvar,
}

/// Worker threads draining a shared job queue.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Starts a pool with `size` workers.
    pub fn new(size: usize) -> Result<Self, RuntimeError> {
        let mut pool = Self {
            shared: Arc::new(Shared::default()),
            workers: Vec::new(),
        };
        pool.spawn_workers(size)?;
        Ok(pool)
    }

    /// Starts a pool sized from the `[runtime]` table.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        Self::new(config.threads)
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Jobs waiting for a worker.
    pub fn queued(&self) -> usize {
        self.shared.state.lock().unwrap().jobs.len()
    }

    /// Runs `job` on a worker, or right here if the pool has none.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        if self.workers.is_empty() {
            job();
            return;
        }
        self.shared.state.lock().unwrap().jobs.push_back(Box::new(job));
        self.shared.work.notify_one();
    }

    /// Blocks until the queue is empty and no job is running.
    pub fn wait_idle(&self) {
        let mut state = self.shared.state.lock().unwrap();
        while !state.jobs.is_empty() || state.running > 0 {
            state = self.shared.idle.wait(state).unwrap();
        }
    }

    /// Replaces the workers with `size` new ones.
    ///
    /// # Panics
    ///
    /// Panics if jobs are still queued.
    pub fn resize(&mut self, size: usize) -> Result<(), RuntimeError> {
        let queued = self.queued();
        assert!(queued == 0, "thread pool resized with {queued} queued jobs");
        self.stop_workers();
        self.spawn_workers(size)
    }

    fn spawn_workers(&mut self, size: usize) -> Result<(), RuntimeError> {
        for index in self.workers.len()..size {
            let name = format!("tempo-worker-{index}");
            let shared = Arc::clone(&self.shared);
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(&shared))
                .map_err(|source| RuntimeError::Spawn { name, source })?;
            self.workers.push(handle);
        }
        log::debug!("thread pool running {} workers", self.workers.len());
        Ok(())
    }

    fn stop_workers(&mut self) {
        self.shared.state.lock().unwrap().shutdown = true;
        self.shared.work.notify_all();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::warn!("thread pool worker exited by panic");
            }
        }
        self.shared.state.lock().unwrap().shutdown = false;
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop_workers();
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let job = {
            let mut state = shared.state.lock().unwrap();
            loop {
                if let Some(job) = state.jobs.pop_front() {
                    state.running += 1;
                    break job;
                }
                if state.shutdown {
                    return;
                }
                state = shared.work.wait(state).unwrap();
            }
        };
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            log::error!("thread pool job panicked");
        }
        let mut state = shared.state.lock().unwrap();
        state.running -= 1;
        if state.jobs.is_empty() && state.running == 0 {
            shared.idle.notify_all();
        }
    }
}

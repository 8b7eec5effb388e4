//! Fixed worker pool with a bounded FIFO job queue.
//!
//! Producers never block in `submit`: a full queue is reported back and
//! the caller backs off (the render producer waits on the not-full
//! condition for about a millisecond and retries). Workers park on the
//! not-empty condition between jobs.
//!
//! Each worker owns a deterministic RNG. A job carries the render
//! generation it belongs to; when a worker picks up a job from a new
//! generation it reseeds from `(worker id, generation)`, so a render
//! pass is reproducible per worker regardless of submission timing.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Work item: a closure and the row index it operates on.
type JobFn = Box<dyn FnOnce(u32, &mut dyn RngCore) + Send>;

struct Job {
    generation: u64,
    row: u32,
    run: JobFn,
}

struct Queue {
    jobs: VecDeque<Job>,
    stopped: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

/// A fixed set of worker threads fed from one bounded queue.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub const DEFAULT_WORKERS: usize = 8;
    pub const DEFAULT_CAPACITY: usize = 32;

    pub fn new(workers: usize, capacity: usize) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                jobs: VecDeque::with_capacity(capacity),
                stopped: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        });

        let handles = (0..workers)
            .map(|id| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("lumen-worker-{id}"))
                    .spawn(move || worker_loop(id, shared))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        log::debug!("worker pool started: {workers} workers, queue capacity {capacity}");
        Self {
            shared,
            workers: Mutex::new(handles),
        }
    }

    /// Try to enqueue a job. Returns `false` without blocking when the
    /// queue is full or the pool has been stopped.
    pub fn submit<F>(&self, generation: u64, row: u32, job: F) -> bool
    where
        F: FnOnce(u32, &mut dyn RngCore) + Send + 'static,
    {
        let mut queue = self.shared.queue.lock();
        if queue.stopped || queue.jobs.len() >= self.shared.capacity {
            return false;
        }
        queue.jobs.push_back(Job {
            generation,
            row,
            run: Box::new(job),
        });
        drop(queue);

        self.shared.not_empty.notify_one();
        true
    }

    /// Park the caller until a queue slot frees up, or the timeout
    /// elapses. Producer back-off primitive for a full queue.
    pub fn wait_not_full(&self, timeout: Duration) {
        let mut queue = self.shared.queue.lock();
        if queue.jobs.len() < self.shared.capacity || queue.stopped {
            return;
        }
        self.shared.not_full.wait_for(&mut queue, timeout);
    }

    /// Whether `stop` has been called. Producers poll this so they do
    /// not spin against a pool that will never drain.
    pub fn is_stopped(&self) -> bool {
        self.shared.queue.lock().stopped
    }

    /// Signal termination, discard pending jobs, and join every worker.
    /// Safe to call more than once.
    pub fn stop(&self) {
        {
            let mut queue = self.shared.queue.lock();
            if queue.stopped {
                return;
            }
            queue.stopped = true;
            queue.jobs.clear();
        }
        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();

        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            let _ = handle.join();
        }
        log::debug!("worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(id: usize, shared: Arc<Shared>) {
    // Reseeded on the first job of each generation.
    let mut rng = StdRng::seed_from_u64(id as u64);
    let mut seeded_for = u64::MAX;

    loop {
        let job = {
            let mut queue = shared.queue.lock();
            loop {
                if queue.stopped {
                    return;
                }
                if let Some(job) = queue.jobs.pop_front() {
                    break job;
                }
                shared.not_empty.wait(&mut queue);
            }
        };
        shared.not_full.notify_one();

        if job.generation != seeded_for {
            rng = StdRng::seed_from_u64(worker_seed(id, job.generation));
            seeded_for = job.generation;
        }
        (job.run)(job.row, &mut rng);
    }
}

/// Mix the worker id into the generation so no two workers share a
/// stream within a pass.
fn worker_seed(id: usize, generation: u64) -> u64 {
    generation ^ (id as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
}

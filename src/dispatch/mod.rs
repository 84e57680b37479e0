mod queue;
mod task;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{guarded, EngineError};

use self::queue::TaskQueue;
pub(crate) use self::task::Task;

/// Counters of dispatched work since the engine was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Tasks accepted by the queue.
    pub submitted: u64,
    /// Tasks whose rules all ran without failing.
    pub completed: u64,
    /// Tasks in which at least one rule failed or panicked.
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

struct Running {
    queue: Arc<TaskQueue<Task>>,
    workers: Vec<JoinHandle<()>>,
}

/// Bounded task queue drained by a fixed pool of worker threads.
pub(crate) struct Dispatcher {
    capacity: usize,
    worker_count: usize,
    running: Mutex<Option<Running>>,
    counters: Arc<Counters>,
}

impl Dispatcher {
    pub(crate) fn new(capacity: usize, worker_count: usize) -> Self {
        Self {
            capacity,
            worker_count,
            running: Mutex::new(None),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Spawn the worker pool. Returns `false` if it was already running.
    pub(crate) fn start(&self) -> Result<bool, EngineError> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Ok(false);
        }
        let queue = Arc::new(TaskQueue::with_capacity(self.capacity));
        let mut workers = Vec::with_capacity(self.worker_count);
        for n in 1..=self.worker_count {
            let name = format!("firerule-worker-{n}");
            let worker_queue = Arc::clone(&queue);
            let counters = Arc::clone(&self.counters);
            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn(move || work(&worker_queue, &counters));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    queue.close();
                    join_all(workers);
                    return Err(EngineError::Spawn {
                        thread: name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        info!(
            workers = self.worker_count,
            capacity = self.capacity,
            "dispatcher started"
        );
        *running = Some(Running { queue, workers });
        Ok(true)
    }

    /// Enqueue `task`, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotStarted`] before `start`, after `shutdown`,
    /// or if a shutdown begins while this call is blocked.
    pub(crate) fn submit(&self, task: Task) -> Result<(), EngineError> {
        let queue = match self.running.lock().as_ref() {
            Some(running) => Arc::clone(&running.queue),
            None => return Err(EngineError::NotStarted),
        };
        match queue.push(task) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(task) => {
                debug!(?task, "task refused by closed queue");
                Err(EngineError::NotStarted)
            }
        }
    }

    /// Stop accepting tasks, let workers drain the queue, and join them.
    /// Returns `false` if nothing was running.
    pub(crate) fn shutdown(&self) -> bool {
        let Some(running) = self.running.lock().take() else {
            return false;
        };
        let pending = running.queue.len();
        running.queue.close();
        debug!(pending, "draining dispatch queue");
        join_all(running.workers);
        info!("dispatcher stopped");
        true
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    pub(crate) fn stats(&self) -> EngineStats {
        EngineStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn work(queue: &TaskQueue<Task>, counters: &Counters) {
    while let Some(task) = queue.pop() {
        let ok = match guarded(|| Ok(task.run())) {
            Ok(ok) => ok,
            Err(e) => {
                warn!(error = %e, "task panicked at worker boundary");
                false
            }
        };
        let counter = if ok {
            &counters.completed
        } else {
            &counters.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

fn join_all(workers: Vec<JoinHandle<()>>) {
    for handle in workers {
        if handle.join().is_err() {
            warn!("dispatch worker panicked");
        }
    }
}

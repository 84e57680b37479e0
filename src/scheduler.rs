use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::error::EngineError;

type Callback = Arc<dyn Fn() + Send + Sync>;

struct Job {
    callback: Callback,
    /// Fixed delay between the end of one run and the start of the next.
    repeat: Option<Duration>,
}

#[derive(PartialEq, Eq)]
struct Due {
    at: Instant,
    id: u64,
}

impl Ord for Due {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // BinaryHeap is a max-heap; earliest deadline must come out first.
        other.at.cmp(&self.at).then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Due {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct State {
    queue: BinaryHeap<Due>,
    /// Live jobs. A heap entry whose id is missing here was cancelled.
    jobs: HashMap<u64, Job>,
    next_id: u64,
    stopped: bool,
}

struct Shared {
    name: String,
    state: Mutex<State>,
    wakeup: Condvar,
}

/// A pool of timer threads running one-shot and fixed-delay jobs.
///
/// Each scheduler is an explicitly owned resource: the engine keeps one for
/// delayed triggers and one for fact collectors, and several engines can
/// coexist in one process. Threads stop on [`shutdown`](Self::shutdown) or
/// when the scheduler is dropped.
pub struct Scheduler {
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

/// Handle to a scheduled job.
///
/// Dropping the handle does not cancel the job.
#[derive(Clone)]
pub struct ScheduledTask {
    id: u64,
    shared: Weak<Shared>,
}

impl Scheduler {
    /// Spawn `threads` timer threads named `{name}-{n}`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Spawn`] if the OS refuses to start a thread.
    pub fn new(name: &str, threads: usize) -> Result<Self, EngineError> {
        let shared = Arc::new(Shared {
            name: name.to_owned(),
            state: Mutex::new(State::default()),
            wakeup: Condvar::new(),
        });
        let scheduler = Self {
            shared,
            threads: Mutex::new(Vec::with_capacity(threads)),
        };
        for n in 1..=threads.max(1) {
            let shared = Arc::clone(&scheduler.shared);
            let thread_name = format!("{name}-{n}");
            let handle = thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || run(&shared))
                .map_err(|e| EngineError::Spawn {
                    thread: thread_name,
                    reason: e.to_string(),
                })?;
            scheduler.threads.lock().push(handle);
        }
        Ok(scheduler)
    }

    /// Run `task` once after `delay`. Returns `None` once the scheduler has
    /// been shut down.
    pub fn schedule<F>(&self, delay: Duration, task: F) -> Option<ScheduledTask>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.insert(delay, Arc::new(task), None)
    }

    /// Run `task` after `initial_delay`, then again `delay` after each run
    /// completes, until cancelled. Returns `None` once the scheduler has been
    /// shut down.
    pub fn schedule_with_fixed_delay<F>(
        &self,
        initial_delay: Duration,
        delay: Duration,
        task: F,
    ) -> Option<ScheduledTask>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.insert(initial_delay, Arc::new(task), Some(delay))
    }

    fn insert(
        &self,
        delay: Duration,
        callback: Callback,
        repeat: Option<Duration>,
    ) -> Option<ScheduledTask> {
        let mut state = self.shared.state.lock();
        if state.stopped {
            warn!(scheduler = %self.shared.name, "job refused after shutdown");
            return None;
        }
        let id = state.next_id;
        state.next_id += 1;
        state.jobs.insert(id, Job { callback, repeat });
        state.queue.push(Due {
            at: Instant::now() + delay,
            id,
        });
        self.shared.wakeup.notify_one();
        Some(ScheduledTask {
            id,
            shared: Arc::downgrade(&self.shared),
        })
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shared.state.lock().stopped
    }

    /// Number of jobs waiting to run, including repeating jobs.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.state.lock().jobs.len()
    }

    /// Stop all threads. Pending jobs are discarded; a job already running
    /// finishes first. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            state.stopped = true;
            state.jobs.clear();
            state.queue.clear();
        }
        self.shared.wakeup.notify_all();
        let current = thread::current().id();
        let handles: Vec<JoinHandle<()>> = self.threads.lock().drain(..).collect();
        for handle in handles {
            if handle.thread().id() == current {
                // Shutting down from inside a job; the loop exits on return.
                continue;
            }
            if handle.join().is_err() {
                warn!(scheduler = %self.shared.name, "scheduler thread panicked");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("name", &self.shared.name)
            .field("pending", &self.pending())
            .finish()
    }
}

impl ScheduledTask {
    /// Prevent any future run. Returns `false` if the job already ran (for a
    /// one-shot job), was already cancelled, or its scheduler is gone. A run
    /// already in progress is not interrupted.
    pub fn cancel(&self) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let removed = shared.state.lock().jobs.remove(&self.id).is_some();
        if removed {
            shared.wakeup.notify_all();
        }
        removed
    }

    /// Whether the job may still run.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.state.lock().jobs.contains_key(&self.id))
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask").field("id", &self.id).finish()
    }
}

fn run(shared: &Shared) {
    let mut state = shared.state.lock();
    loop {
        if state.stopped {
            return;
        }
        let Some((at, id)) = state.queue.peek().map(|d| (d.at, d.id)) else {
            shared.wakeup.wait(&mut state);
            continue;
        };
        if !state.jobs.contains_key(&id) {
            state.queue.pop();
            continue;
        }
        if at > Instant::now() {
            shared.wakeup.wait_until(&mut state, at);
            continue;
        }
        let Some(due) = state.queue.pop() else {
            continue;
        };
        let (callback, repeat) = match state.jobs.get(&due.id) {
            Some(job) => (Arc::clone(&job.callback), job.repeat),
            None => continue,
        };
        if repeat.is_none() {
            state.jobs.remove(&due.id);
        }

        drop(state);
        if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback())).is_err() {
            warn!(scheduler = %shared.name, job = due.id, "scheduled job panicked");
        }
        state = shared.state.lock();

        if let Some(delay) = repeat {
            if state.jobs.contains_key(&due.id) && !state.stopped {
                state.queue.push(Due {
                    at: Instant::now() + delay,
                    id: due.id,
                });
            } else {
                debug!(scheduler = %shared.name, job = due.id, "repeating job cancelled");
            }
        }
    }
}

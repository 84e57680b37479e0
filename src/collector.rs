use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::{CollectError, EngineError};
use crate::Fact;

/// A periodic source of facts, polled by the engine on its collector pool.
///
/// Names must be unique within one engine.
pub trait FactCollector: Send + Sync {
    fn name(&self) -> &str;

    /// Called when the collector is registered and on every engine restart.
    fn startup(&self) {}

    /// Called when the collector is removed and on engine shutdown.
    fn shutdown(&self) {}

    /// Everything produced since the last poll.
    ///
    /// # Errors
    ///
    /// A failed cycle is logged; polling continues at the next interval.
    fn collect(&self) -> Result<Vec<Fact>, CollectError>;
}

/// A bounded buffer that producers fill concurrently and each poll drains.
///
/// ```
/// use firerule::{Fact, FactCollector, QueueCollector};
///
/// let sensors = QueueCollector::new("sensors", 2).unwrap();
/// assert!(sensors.offer(Fact::new("t1")));
/// assert!(sensors.offer(Fact::new("t2")));
/// assert!(!sensors.offer(Fact::new("t3")));
/// assert_eq!(sensors.collect().unwrap().len(), 2);
/// ```
pub struct QueueCollector {
    name: String,
    capacity: usize,
    buffer: Mutex<VecDeque<Fact>>,
    running: AtomicBool,
}

impl QueueCollector {
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `capacity` is zero.
    pub fn new(name: impl Into<String>, capacity: usize) -> Result<Self, EngineError> {
        if capacity == 0 {
            return Err(EngineError::InvalidConfig {
                reason: "collector capacity must be greater than 0".to_owned(),
            });
        }
        Ok(Self {
            name: name.into(),
            capacity,
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            running: AtomicBool::new(false),
        })
    }

    /// Buffer a fact for the next poll. Returns `false` and drops the fact
    /// when the buffer is full.
    pub fn offer(&self, fact: Fact) -> bool {
        let mut buffer = self.buffer.lock();
        if buffer.len() >= self.capacity {
            return false;
        }
        buffer.push_back(fact);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the engine has started this collector and not shut it down.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl FactCollector for QueueCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn startup(&self) {
        self.running.store(true, Ordering::Release);
    }

    fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn collect(&self) -> Result<Vec<Fact>, CollectError> {
        Ok(self.buffer.lock().drain(..).collect())
    }
}

impl fmt::Debug for QueueCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueCollector")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("buffered", &self.len())
            .finish()
    }
}

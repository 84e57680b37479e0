use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::dispatch::{Dispatcher, Task};
use crate::scheduler::{ScheduledTask, Scheduler};
use crate::{EngineConfig, EngineError, EngineStats, Fact, FactCollector, RuleRegistry};

struct CollectorEntry {
    collector: Arc<dyn FactCollector>,
    interval: Duration,
    ordered: bool,
    /// Cleared on removal so an in-flight poll stops handing over facts.
    active: Arc<AtomicBool>,
    task: Option<ScheduledTask>,
}

#[derive(Default)]
struct Collectors {
    /// Present while the engine is started.
    scheduler: Option<Scheduler>,
    entries: HashMap<String, CollectorEntry>,
}

struct EngineCore {
    registry: Arc<RuleRegistry>,
    config: EngineConfig,
    dispatcher: Dispatcher,
    delay_scheduler: Arc<Scheduler>,
    collectors: Mutex<Collectors>,
}

impl EngineCore {
    fn fire(&self, fact: Fact, ordered: bool) -> Result<(), EngineError> {
        if !self.dispatcher.is_running() {
            return Err(EngineError::NotStarted);
        }
        let fact = Arc::new(fact);
        if ordered {
            return self.dispatcher.submit(Task::Ordered {
                fact,
                registry: Arc::clone(&self.registry),
                policy: self.config.skip_policy(),
            });
        }
        // Submit from a snapshot: a producer blocked on a full queue must not
        // hold the registry lock.
        for rule in self.registry.snapshot() {
            if rule.is_enabled() {
                self.dispatcher.submit(Task::Single {
                    fact: Arc::clone(&fact),
                    rule,
                })?;
            }
        }
        Ok(())
    }

    fn poll(&self, collector: &dyn FactCollector, ordered: bool, active: &AtomicBool) {
        let facts = match collector.collect() {
            Ok(facts) => facts,
            Err(e) => {
                warn!(collector = %collector.name(), error = %e, "fact collection failed");
                return;
            }
        };
        debug!(collector = %collector.name(), facts = facts.len(), "collected");
        for fact in facts {
            if !active.load(Ordering::Acquire) {
                debug!(collector = %collector.name(), "collector removed mid-poll");
                return;
            }
            if let Err(e) = self.fire(fact, ordered) {
                warn!(collector = %collector.name(), error = %e, "dropping collected facts");
                return;
            }
        }
    }
}

/// Schedule periodic polling of `entry` on `scheduler`, first poll after
/// one interval.
fn schedule_collector(
    core: &Arc<EngineCore>,
    scheduler: &Scheduler,
    entry: &CollectorEntry,
) -> Option<ScheduledTask> {
    let engine: Weak<EngineCore> = Arc::downgrade(core);
    let collector = Arc::clone(&entry.collector);
    let active = Arc::clone(&entry.active);
    let ordered = entry.ordered;
    scheduler.schedule_with_fixed_delay(entry.interval, entry.interval, move || {
        if !active.load(Ordering::Acquire) {
            return;
        }
        if let Some(core) = engine.upgrade() {
            core.poll(collector.as_ref(), ordered, &active);
        }
    })
}

/// Matches facts against the rules of a [`RuleRegistry`] on a pool of
/// worker threads.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use firerule::{effect, field, EngineConfig, Fact, RuleBuilder, RuleEngine, RuleRegistry};
///
/// let registry = Arc::new(RuleRegistry::new());
/// registry
///     .add(
///         RuleBuilder::new("overheat")
///             .when(field("temp").gt(90_i64))
///             .then(effect(|fact| println!("{} is overheating", fact.id())))
///             .build()
///             .unwrap(),
///     )
///     .unwrap();
///
/// let engine = RuleEngine::new(Arc::clone(&registry), EngineConfig::default()).unwrap();
/// engine.start().unwrap();
/// engine.fire(Fact::new("boiler-1").set("temp", 95_i64), false).unwrap();
/// engine.shutdown();
/// ```
pub struct RuleEngine {
    core: Arc<EngineCore>,
}

impl RuleEngine {
    /// Create a stopped engine over `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `config` fails validation,
    /// or [`EngineError::Spawn`] if the trigger timer thread cannot start.
    pub fn new(registry: Arc<RuleRegistry>, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let delay_scheduler = Arc::new(Scheduler::new("firerule-trigger", 1)?);
        let dispatcher = Dispatcher::new(config.queue_capacity, config.worker_count);
        Ok(Self {
            core: Arc::new(EngineCore {
                registry,
                config,
                dispatcher,
                delay_scheduler,
                collectors: Mutex::new(Collectors::default()),
            }),
        })
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.core.registry
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.core.config
    }

    /// The timer pool that delayed stateful rules for this engine should be
    /// built with. It outlives engine restarts.
    #[must_use]
    pub fn delay_scheduler(&self) -> &Arc<Scheduler> {
        &self.core.delay_scheduler
    }

    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.core.dispatcher.stats()
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.core.dispatcher.is_running()
    }

    /// Start the worker pool and every registered collector. A redundant
    /// start logs a warning and does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Spawn`] if a worker or collector thread cannot
    /// start; the engine is left stopped.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut collectors = self.core.collectors.lock();
        if !self.core.dispatcher.start()? {
            warn!("rule engine already started");
            return Ok(());
        }
        let scheduler = match Scheduler::new(
            "firerule-collector",
            self.core.config.collector_pool_size,
        ) {
            Ok(scheduler) => scheduler,
            Err(e) => {
                self.core.dispatcher.shutdown();
                return Err(e);
            }
        };
        for entry in collectors.entries.values_mut() {
            entry.collector.startup();
            entry.task = schedule_collector(&self.core, &scheduler, entry);
            info!(collector = %entry.collector.name(), "collector started");
        }
        collectors.scheduler = Some(scheduler);
        info!(rules = self.core.registry.len(), "rule engine started");
        Ok(())
    }

    /// Stop collectors, then drain queued tasks and join the workers.
    /// Registered collectors stay registered for the next [`start`](Self::start).
    /// Idempotent.
    pub fn shutdown(&self) {
        let mut collectors = self.core.collectors.lock();
        if let Some(scheduler) = collectors.scheduler.take() {
            for entry in collectors.entries.values_mut() {
                if let Some(task) = entry.task.take() {
                    task.cancel();
                }
                entry.collector.shutdown();
            }
            scheduler.shutdown();
        }
        drop(collectors);
        if self.core.dispatcher.shutdown() {
            info!("rule engine stopped");
        }
    }

    /// Evaluate `fact` against the registered rules.
    ///
    /// With `ordered == false` every enabled rule gets its own task and rules
    /// run concurrently. With `ordered == true` one worker walks the rules in
    /// descending priority, honoring the configured [`SkipPolicy`](crate::SkipPolicy).
    /// Blocks while the dispatch queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotStarted`] if the engine is not running.
    pub fn fire(&self, fact: Fact, ordered: bool) -> Result<(), EngineError> {
        self.core.fire(fact, ordered)
    }

    /// Register `collector` and poll it every `interval`, firing each
    /// collected fact. The first poll happens one interval from now.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotStarted`] if the engine is not running,
    /// [`EngineError::DuplicateCollector`] if the name is taken, or
    /// [`EngineError::InvalidConfig`] for a zero interval.
    pub fn fire_by_collector(
        &self,
        interval: Duration,
        collector: Arc<dyn FactCollector>,
        ordered: bool,
    ) -> Result<(), EngineError> {
        if interval.is_zero() {
            return Err(EngineError::InvalidConfig {
                reason: "collector interval must be greater than 0".to_owned(),
            });
        }
        let mut collectors = self.core.collectors.lock();
        let Collectors {
            scheduler,
            entries,
        } = &mut *collectors;
        let Some(scheduler) = scheduler.as_ref() else {
            return Err(EngineError::NotStarted);
        };
        let name = collector.name().to_owned();
        if entries.contains_key(&name) {
            return Err(EngineError::DuplicateCollector { name });
        }
        collector.startup();
        let mut entry = CollectorEntry {
            collector,
            interval,
            ordered,
            active: Arc::new(AtomicBool::new(true)),
            task: None,
        };
        entry.task = schedule_collector(&self.core, scheduler, &entry);
        info!(collector = %name, interval_ms = interval.as_millis() as u64, ordered, "collector registered");
        entries.insert(name, entry);
        Ok(())
    }

    /// Cancel a collector's schedule, call its `shutdown`, and forget it.
    ///
    /// A poll already running when this is called stops before firing its
    /// next fact. Facts already enqueued still complete, and so does a fact
    /// whose `fire` call is in progress at that moment. Returns `false` if no
    /// collector has that name.
    pub fn remove_fact_collector(&self, name: &str) -> bool {
        let Some(entry) = self.core.collectors.lock().entries.remove(name) else {
            return false;
        };
        entry.active.store(false, Ordering::Release);
        if let Some(task) = entry.task {
            task.cancel();
            entry.collector.shutdown();
        }
        info!(collector = %name, "collector removed");
        true
    }

    /// Names of registered collectors, in no particular order.
    #[must_use]
    pub fn collector_names(&self) -> Vec<String> {
        self.core.collectors.lock().entries.keys().cloned().collect()
    }
}

impl Drop for RuleEngine {
    fn drop(&mut self) {
        self.shutdown();
        self.core.delay_scheduler.shutdown();
    }
}

impl fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleEngine")
            .field("registry", &self.core.registry)
            .field("config", &self.core.config)
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::EngineError;
use crate::Rule;

/// Position of a rule in walk order: descending priority, then insertion
/// order among equal priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct RankKey {
    priority: Reverse<i32>,
    seq: u64,
}

#[derive(Default)]
struct Inner {
    ordered: BTreeMap<RankKey, Arc<dyn Rule>>,
    by_id: HashMap<String, RankKey>,
    next_seq: u64,
}

/// Thread-safe store of rules keyed by id and iterable in priority order.
///
/// Readers (lookups and walks) run concurrently with each other; `add`,
/// `remove` and `clear` are exclusive with everything else. Reads are
/// recursive: a rule action running inside [`for_each`](Self::for_each) may
/// read the registry again (or fire more facts) even while a writer waits.
#[derive(Default)]
pub struct RuleRegistry {
    inner: RwLock<Inner>,
}

impl RuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DuplicateRule`] if a rule with the same id is
    /// already registered; the existing rule is left untouched.
    pub fn add(&self, rule: impl Rule + 'static) -> Result<(), EngineError> {
        self.add_shared(Arc::new(rule))
    }

    /// Register a rule the caller keeps a handle to, e.g. to inspect or
    /// disable it later.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DuplicateRule`] if the id is taken.
    pub fn add_shared(&self, rule: Arc<dyn Rule>) -> Result<(), EngineError> {
        let mut inner = self.inner.write();
        if inner.by_id.contains_key(rule.id()) {
            return Err(EngineError::DuplicateRule {
                id: rule.id().to_owned(),
            });
        }
        let key = RankKey {
            priority: Reverse(rule.priority()),
            seq: inner.next_seq,
        };
        inner.next_seq += 1;
        inner.by_id.insert(rule.id().to_owned(), key);
        inner.ordered.insert(key, rule);
        Ok(())
    }

    /// Remove a rule by id, returning it. Absent ids are a no-op.
    pub fn remove(&self, id: &str) -> Option<Arc<dyn Rule>> {
        let mut inner = self.inner.write();
        let key = inner.by_id.remove(id)?;
        inner.ordered.remove(&key)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn Rule>> {
        let inner = self.inner.read_recursive();
        let key = inner.by_id.get(id)?;
        inner.ordered.get(key).cloned()
    }

    /// Visit rules in descending priority order until the visitor breaks.
    ///
    /// The registry stays read-locked for the whole walk, so the visitor may
    /// read it but must not add or remove rules.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&Arc<dyn Rule>) -> ControlFlow<()>,
    {
        let inner = self.inner.read_recursive();
        for rule in inner.ordered.values() {
            if visitor(rule).is_break() {
                break;
            }
        }
    }

    /// A copy of the rules in descending priority order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<dyn Rule>> {
        self.inner.read_recursive().ordered.values().cloned().collect()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.ordered.clear();
        inner.by_id.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read_recursive().by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rule ids in walk order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.inner
            .read_recursive()
            .ordered
            .values()
            .map(|r| r.id().to_owned())
            .collect()
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.ids())
            .finish()
    }
}

impl fmt::Display for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuleRegistry({} rules)", self.len())
    }
}

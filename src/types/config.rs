use crate::error::EngineError;

const DEFAULT_QUEUE_CAPACITY: usize = 4096;

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        * 2
}

/// Short-circuit switches for ordered (priority-walk) firing.
///
/// The flags are independent; whichever condition is met first ends the walk
/// for the current fact only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipPolicy {
    /// Stop after the first rule whose condition held and whose `then` ran.
    pub skip_on_first_applied_rule: bool,
    /// Stop after the first rule whose condition did not hold.
    pub skip_on_first_non_applied_rule: bool,
    /// Stop after the first rule whose condition or action failed.
    pub skip_on_first_failed_rule: bool,
}

/// Engine-wide settings. Build with [`EngineConfig::builder()`].
///
/// With the `serde` feature enabled, missing fields deserialize to their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    pub skip_on_first_applied_rule: bool,
    pub skip_on_first_non_applied_rule: bool,
    pub skip_on_first_failed_rule: bool,
    /// Threads running periodic fact collectors.
    pub collector_pool_size: usize,
    /// Slots in the dispatch ring; `fire` blocks when every slot is taken.
    pub queue_capacity: usize,
    /// Dispatch worker threads.
    pub worker_count: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            skip_on_first_applied_rule: false,
            skip_on_first_non_applied_rule: false,
            skip_on_first_failed_rule: false,
            collector_pool_size: default_parallelism(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            worker_count: default_parallelism(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    #[must_use]
    pub fn skip_policy(&self) -> SkipPolicy {
        SkipPolicy {
            skip_on_first_applied_rule: self.skip_on_first_applied_rule,
            skip_on_first_non_applied_rule: self.skip_on_first_non_applied_rule,
            skip_on_first_failed_rule: self.skip_on_first_failed_rule,
        }
    }

    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if any pool or queue size is zero.
    pub fn validate(&self) -> Result<(), EngineError> {
        let sizes = [
            ("queue_capacity", self.queue_capacity),
            ("worker_count", self.worker_count),
            ("collector_pool_size", self.collector_pool_size),
        ];
        for (name, size) in sizes {
            if size == 0 {
                return Err(EngineError::InvalidConfig {
                    reason: format!("{name} must be greater than 0"),
                });
            }
        }
        Ok(())
    }
}

/// Fluent builder for [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    #[must_use]
    pub fn skip_on_first_applied_rule(mut self, skip: bool) -> Self {
        self.config.skip_on_first_applied_rule = skip;
        self
    }

    #[must_use]
    pub fn skip_on_first_non_applied_rule(mut self, skip: bool) -> Self {
        self.config.skip_on_first_non_applied_rule = skip;
        self
    }

    #[must_use]
    pub fn skip_on_first_failed_rule(mut self, skip: bool) -> Self {
        self.config.skip_on_first_failed_rule = skip;
        self
    }

    #[must_use]
    pub fn collector_pool_size(mut self, size: usize) -> Self {
        self.config.collector_pool_size = size;
        self
    }

    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    #[must_use]
    pub fn worker_count(mut self, workers: usize) -> Self {
        self.config.worker_count = workers;
        self
    }

    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if any pool or queue size is zero.
    pub fn build(self) -> Result<EngineConfig, EngineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::builder().build().unwrap();
        assert!(!config.skip_on_first_applied_rule);
        assert!(!config.skip_on_first_non_applied_rule);
        assert!(!config.skip_on_first_failed_rule);
        assert_eq!(config.queue_capacity, 4096);
        assert!(config.worker_count >= 2);
        assert_eq!(config.worker_count % 2, 0);
        assert_eq!(config.skip_policy(), SkipPolicy::default());
    }

    #[test]
    fn skip_policy_mirrors_flags() {
        let config = EngineConfig::builder()
            .skip_on_first_applied_rule(true)
            .skip_on_first_failed_rule(true)
            .build()
            .unwrap();
        let policy = config.skip_policy();
        assert!(policy.skip_on_first_applied_rule);
        assert!(!policy.skip_on_first_non_applied_rule);
        assert!(policy.skip_on_first_failed_rule);
    }

    #[test]
    fn zero_sizes_rejected() {
        let err = EngineConfig::builder().worker_count(0).build().unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidConfig {
                reason: "worker_count must be greater than 0".into()
            }
        );
        assert!(EngineConfig::builder().queue_capacity(0).build().is_err());
        assert!(EngineConfig::builder()
            .collector_pool_size(0)
            .build()
            .is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_with_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"skip_on_first_applied_rule": true, "worker_count": 3}"#)
                .unwrap();
        assert!(config.skip_on_first_applied_rule);
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.queue_capacity, 4096);
    }
}

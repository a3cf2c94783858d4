//! Dispatch configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How tasks are scheduled across the host set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// One host at a time, in host set order
    #[default]
    Sequential,
    /// All hosts at once, optionally capped by `max_parallel`
    Concurrent,
}

/// Immutable settings handed to the dispatcher at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Scheduling mode
    pub mode: DispatchMode,
    /// Limit on connect plus authentication per host
    pub connect_timeout: Duration,
    /// Limit on a whole task per host, including connect
    pub task_timeout: Option<Duration>,
    /// Cap on simultaneously open channels in concurrent mode (`None` = unbounded)
    pub max_parallel: Option<usize>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Sequential,
            connect_timeout: Duration::from_secs(30),
            task_timeout: Some(Duration::from_secs(600)),
            max_parallel: None,
        }
    }
}

impl DispatchConfig {
    /// Set the dispatch mode
    #[must_use]
    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the per-host connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-host task timeout
    #[must_use]
    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Cap concurrent channels; `0` means unbounded
    #[must_use]
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = (max > 0).then_some(max);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_behaviour() {
        let config = DispatchConfig::default();
        assert_eq!(config.mode, DispatchMode::Sequential);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.task_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.max_parallel, None);
    }

    #[test]
    fn test_zero_parallel_is_unbounded() {
        assert_eq!(DispatchConfig::default().with_max_parallel(0).max_parallel, None);
        assert_eq!(
            DispatchConfig::default().with_max_parallel(8).max_parallel,
            Some(8)
        );
    }
}

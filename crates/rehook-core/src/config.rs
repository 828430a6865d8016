//! Runtime configuration.

use std::time::Duration;

/// Configuration for a [`Runtime`](crate::Runtime).
///
/// Built with [`Default`] plus `with_*` methods:
///
/// ```
/// use std::time::Duration;
/// use rehook_core::RuntimeConfig;
///
/// let config = RuntimeConfig::default()
///     .with_debug(true)
///     .with_max_passes_per_second(50)
///     .with_low_priority_delay(Duration::from_millis(8));
/// assert_eq!(config.max_passes_per_second, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Enables hook-rule diagnostics (order and count checks).
    pub debug: bool,
    /// Maximum number of render passes allowed within `loop_window`.
    pub max_passes_per_second: u32,
    /// Length of the render-loop detection window.
    pub loop_window: Duration,
    /// Delay a host should wait before running low-priority work.
    pub low_priority_delay: Duration,
    /// Prefix for identifiers produced by `use_id`.
    pub id_prefix: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            debug: cfg!(debug_assertions),
            max_passes_per_second: 100,
            loop_window: Duration::from_secs(1),
            low_priority_delay: Duration::from_millis(16),
            id_prefix: "rehook".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_max_passes_per_second(mut self, limit: u32) -> Self {
        self.max_passes_per_second = limit;
        self
    }

    pub fn with_loop_window(mut self, window: Duration) -> Self {
        self.loop_window = window;
        self
    }

    pub fn with_low_priority_delay(mut self, delay: Duration) -> Self {
        self.low_priority_delay = delay;
        self
    }

    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_passes_per_second, 100);
        assert_eq!(config.loop_window, Duration::from_secs(1));
        assert_eq!(config.id_prefix, "rehook");
    }

    #[test]
    fn builder_overrides() {
        let config = RuntimeConfig::new()
            .with_debug(false)
            .with_loop_window(Duration::from_millis(250))
            .with_id_prefix("app");
        assert!(!config.debug);
        assert_eq!(config.loop_window, Duration::from_millis(250));
        assert_eq!(config.id_prefix, "app");
    }
}

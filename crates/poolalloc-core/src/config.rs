//! Pool configuration.
//!
//! Size classes are fixed at compile time. What remains tunable is the
//! refill batch, handle validation, and the lifecycle log capacity. Each can
//! be set programmatically or read from the environment:
//! - `POOLALLOC_MODE`: `strict` (default) checks that released handles were
//!   minted by the same pool; `off` skips the check.
//! - `POOLALLOC_BATCH`: blocks carved per refill (default 20).
//! - `POOLALLOC_LOG_CAPACITY`: lifecycle records retained (0 disables).

use crate::pool::size_class::{DEFAULT_BATCH, MAX_BATCH};

/// Default number of lifecycle records retained by a pool.
pub const DEFAULT_LOG_CAPACITY: usize = 4096;

/// Handle validation performed on release, resize, and byte access.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationMode {
    /// Reject handles minted by another pool instance.
    #[default]
    Strict,
    /// Skip the owner check. Handles are still resolved against this pool's
    /// regions, so a foreign handle that lands on one of them is taken as
    /// this pool's own: a small one joins a free list while its real owner
    /// still uses it, and a large one frees whatever large allocation lives
    /// at that index. Handles that resolve to nothing, or that would return
    /// an arena region, are refused with `UnknownBlock`.
    Off,
}

impl ValidationMode {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" | "disabled" | "unchecked" => Self::Off,
            _ => Self::Strict,
        }
    }

    /// Returns true if handle ownership is verified.
    #[must_use]
    pub const fn checks_owner(self) -> bool {
        matches!(self, Self::Strict)
    }

    /// Lowercase name, as accepted by [`ValidationMode::from_str_loose`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Off => "off",
        }
    }
}

/// Tunables for a [`PoolAllocator`](crate::PoolAllocator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    batch: usize,
    validation: ValidationMode,
    log_capacity: usize,
}

impl PoolConfig {
    /// Default configuration: batch of 20, strict validation.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            batch: DEFAULT_BATCH,
            validation: ValidationMode::Strict,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }

    /// Reads overrides from the environment on top of the defaults.
    ///
    /// Unparseable values fall back to the default for that field.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new();
        if let Some(mode) = lookup("POOLALLOC_MODE") {
            config = config.with_validation(ValidationMode::from_str_loose(&mode));
        }
        if let Some(batch) = lookup("POOLALLOC_BATCH").and_then(|v| v.trim().parse().ok()) {
            config = config.with_batch(batch);
        }
        if let Some(cap) = lookup("POOLALLOC_LOG_CAPACITY").and_then(|v| v.trim().parse().ok()) {
            config = config.with_log_capacity(cap);
        }
        config
    }

    /// Sets the refill batch, clamped to `1..=MAX_BATCH`.
    #[must_use]
    pub const fn with_batch(mut self, batch: usize) -> Self {
        self.batch = if batch == 0 {
            1
        } else if batch > MAX_BATCH {
            MAX_BATCH
        } else {
            batch
        };
        self
    }

    /// Sets the validation mode.
    #[must_use]
    pub const fn with_validation(mut self, validation: ValidationMode) -> Self {
        self.validation = validation;
        self
    }

    /// Sets how many lifecycle records are retained. Zero disables logging.
    #[must_use]
    pub const fn with_log_capacity(mut self, log_capacity: usize) -> Self {
        self.log_capacity = log_capacity;
        self
    }

    #[must_use]
    pub const fn batch(&self) -> usize {
        self.batch
    }

    #[must_use]
    pub const fn validation(&self) -> ValidationMode {
        self.validation
    }

    #[must_use]
    pub const fn log_capacity(&self) -> usize {
        self.log_capacity
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parse_validation_modes() {
        assert_eq!(ValidationMode::from_str_loose("strict"), ValidationMode::Strict);
        assert_eq!(ValidationMode::from_str_loose("STRICT"), ValidationMode::Strict);
        assert_eq!(ValidationMode::from_str_loose("off"), ValidationMode::Off);
        assert_eq!(ValidationMode::from_str_loose(" None "), ValidationMode::Off);
        assert_eq!(ValidationMode::from_str_loose("unchecked"), ValidationMode::Off);
        assert_eq!(ValidationMode::from_str_loose("bogus"), ValidationMode::Strict);
    }

    #[test]
    fn default_is_strict_with_batch_20() {
        let config = PoolConfig::default();
        assert_eq!(config.batch(), 20);
        assert_eq!(config.validation(), ValidationMode::Strict);
        assert_eq!(config.log_capacity(), DEFAULT_LOG_CAPACITY);
        assert!(config.validation().checks_owner());
        assert!(!ValidationMode::Off.checks_owner());
    }

    #[test]
    fn batch_is_clamped() {
        assert_eq!(PoolConfig::new().with_batch(0).batch(), 1);
        assert_eq!(PoolConfig::new().with_batch(7).batch(), 7);
        assert_eq!(PoolConfig::new().with_batch(usize::MAX).batch(), MAX_BATCH);
    }

    #[test]
    fn lookup_overrides_defaults() {
        let env: HashMap<&str, &str> = [
            ("POOLALLOC_MODE", "off"),
            ("POOLALLOC_BATCH", "5"),
            ("POOLALLOC_LOG_CAPACITY", "0"),
        ]
        .into_iter()
        .collect();
        let config = PoolConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.validation(), ValidationMode::Off);
        assert_eq!(config.batch(), 5);
        assert_eq!(config.log_capacity(), 0);
    }

    #[test]
    fn unparseable_lookup_keeps_defaults() {
        let config = PoolConfig::from_lookup(|k| match k {
            "POOLALLOC_BATCH" => Some("many".to_string()),
            _ => None,
        });
        assert_eq!(config, PoolConfig::default());
    }

    #[test]
    fn mode_names_roundtrip() {
        for mode in [ValidationMode::Strict, ValidationMode::Off] {
            assert_eq!(ValidationMode::from_str_loose(mode.as_str()), mode);
        }
    }
}

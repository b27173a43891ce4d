//! Tree configuration module.
//!
//! This module provides the construction parameters of a [`BPlusTree`] and the
//! environment loading used by the `bptree` binary.
//!
//! # Environment Variables
//!
//! - `BPTREE_MAX_INTERNAL_FANOUT`: Maximum entries per internal node (default: `511`)
//! - `BPTREE_MAX_LEAF_ENTRIES`: Maximum entries per leaf node (default: `255`)
//! - `BPTREE_DEMO_KEYS`: Number of keys the demo inserts and deletes (default: `1000`)
//! - `BPTREE_SIM_SEED`: Seed of the demo simulation (default: `42`)
//! - `BPTREE_SIM_OPERATIONS`: Operations in the demo simulation (default: `10000`)
//!
//! # Invariants
//!
//! - A validated `TreeConfig` has both capacities `>= MIN_CAPACITY`
//!
//! [`BPlusTree`]: crate::index::BPlusTree

use std::str::FromStr;

/// Smallest capacity for which splitting and merging terminate.
pub const MIN_CAPACITY: usize = 2;

/// Capacity parameters of a tree. Immutable once the tree is built.
///
/// # Post-conditions
///
/// When returned from `validate()` or `from_env()`:
/// - `max_internal_fanout >= MIN_CAPACITY`
/// - `max_leaf_entries >= MIN_CAPACITY`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// Maximum number of (separator, child) pairs in an internal node.
    pub max_internal_fanout: usize,
    /// Maximum number of key-value pairs in a leaf node.
    pub max_leaf_entries: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_internal_fanout: Self::DEFAULT_MAX_INTERNAL_FANOUT,
            max_leaf_entries: Self::DEFAULT_MAX_LEAF_ENTRIES,
        }
    }
}

impl TreeConfig {
    /// Default internal fanout.
    pub const DEFAULT_MAX_INTERNAL_FANOUT: usize = 511;
    /// Default leaf capacity.
    pub const DEFAULT_MAX_LEAF_ENTRIES: usize = 255;

    /// Create a config with explicit capacities. Not validated until used.
    #[must_use]
    pub const fn new(max_internal_fanout: usize, max_leaf_entries: usize) -> Self {
        Self {
            max_internal_fanout,
            max_leaf_entries,
        }
    }

    /// Set the internal fanout.
    #[must_use]
    pub const fn with_max_internal_fanout(mut self, fanout: usize) -> Self {
        self.max_internal_fanout = fanout;
        self
    }

    /// Set the leaf capacity.
    #[must_use]
    pub const fn with_max_leaf_entries(mut self, entries: usize) -> Self {
        self.max_leaf_entries = entries;
        self
    }

    /// Check both capacities against `MIN_CAPACITY`.
    pub fn validate(self) -> Result<Self, ConfigError> {
        check_capacity("max_internal_fanout", self.max_internal_fanout)?;
        check_capacity("max_leaf_entries", self.max_leaf_entries)?;
        Ok(self)
    }

    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BPTREE_MAX_INTERNAL_FANOUT`: Internal fanout (default: `511`)
    /// - `BPTREE_MAX_LEAF_ENTRIES`: Leaf capacity (default: `255`)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - a variable is set but is not a valid unsigned integer
    /// - a capacity is below `MIN_CAPACITY`
    pub fn from_env() -> Result<Self, ConfigError> {
        let max_internal_fanout = load_or_default(
            "BPTREE_MAX_INTERNAL_FANOUT",
            Self::DEFAULT_MAX_INTERNAL_FANOUT,
        )?;
        let max_leaf_entries =
            load_or_default("BPTREE_MAX_LEAF_ENTRIES", Self::DEFAULT_MAX_LEAF_ENTRIES)?;

        Self::new(max_internal_fanout, max_leaf_entries).validate()
    }
}

/// Parameters of the `bptree` demo binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoConfig {
    /// Capacities of the demo trees.
    pub tree: TreeConfig,
    /// Keys `1..=demo_keys` are inserted then deleted.
    pub demo_keys: u32,
    /// Seed of the randomized simulation run.
    pub simulation_seed: u64,
    /// Number of operations in the simulation run.
    pub simulation_operations: usize,
}

impl DemoConfig {
    /// Default number of demo keys.
    pub const DEFAULT_DEMO_KEYS: u32 = 1000;
    /// Default simulation seed.
    pub const DEFAULT_SIMULATION_SEED: u64 = 42;
    /// Default simulation length.
    pub const DEFAULT_SIMULATION_OPERATIONS: usize = 10_000;

    /// Load the demo parameters (and the tree capacities) from environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            tree: TreeConfig::from_env()?,
            demo_keys: load_or_default("BPTREE_DEMO_KEYS", Self::DEFAULT_DEMO_KEYS)?,
            simulation_seed: load_or_default("BPTREE_SIM_SEED", Self::DEFAULT_SIMULATION_SEED)?,
            simulation_operations: load_or_default(
                "BPTREE_SIM_OPERATIONS",
                Self::DEFAULT_SIMULATION_OPERATIONS,
            )?,
        })
    }
}

fn check_capacity(name: &str, value: usize) -> Result<(), ConfigError> {
    if value < MIN_CAPACITY {
        return Err(ConfigError::InvalidCapacity {
            name: name.to_string(),
            value,
            minimum: MIN_CAPACITY,
        });
    }
    Ok(())
}

/// Load a numeric variable from environment.
///
/// Returns the default if not set.
///
/// # Errors
///
/// Returns an error if the value is set but does not parse.
fn load_or_default<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    std::env::var(name).map_or_else(|_| Ok(default), |value| parse_value(name, &value))
}

fn parse_value<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        name: name.to_string(),
        message: format!("'{value}' is not a valid unsigned integer"),
    })
}

/// Error returned when a configuration is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A capacity is too small for the split/merge algorithm.
    InvalidCapacity {
        name: String,
        value: usize,
        minimum: usize,
    },
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCapacity {
                name,
                value,
                minimum,
            } => write!(f, "invalid {name}: {value} (must be at least {minimum})"),
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = TreeConfig::default();
        assert_eq!(config.max_internal_fanout, 511);
        assert_eq!(config.max_leaf_entries, 255);
        assert_eq!(config.validate(), Ok(config));
    }

    #[test]
    fn test_builder_setters() {
        let config = TreeConfig::default()
            .with_max_internal_fanout(3)
            .with_max_leaf_entries(4);
        assert_eq!(config, TreeConfig::new(3, 4));
    }

    #[test]
    fn test_minimum_capacity_accepted() {
        assert!(TreeConfig::new(2, 2).validate().is_ok());
    }

    #[test]
    fn test_small_capacity_rejected() {
        let error = TreeConfig::new(1, 255).validate().expect_err("fanout 1");
        assert_eq!(
            error,
            ConfigError::InvalidCapacity {
                name: "max_internal_fanout".to_string(),
                value: 1,
                minimum: 2,
            }
        );

        let error = TreeConfig::new(511, 0).validate().expect_err("leaf 0");
        assert!(matches!(
            error,
            ConfigError::InvalidCapacity { ref name, value: 0, .. } if name == "max_leaf_entries"
        ));
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value::<usize>("X", " 17 "), Ok(17));
        let error = parse_value::<usize>("X", "-3").expect_err("negative");
        assert_eq!(
            error.to_string(),
            "invalid value for X: '-3' is not a valid unsigned integer"
        );
    }

    #[test]
    fn test_load_or_default_unset_variable() {
        let value = load_or_default::<usize>("BPTREE_TEST_NEVER_SET", 511);
        assert_eq!(value, Ok(511));
    }

    #[test]
    fn test_config_error_display_capacity() {
        let error = ConfigError::InvalidCapacity {
            name: "max_leaf_entries".to_string(),
            value: 1,
            minimum: 2,
        };
        assert_eq!(
            error.to_string(),
            "invalid max_leaf_entries: 1 (must be at least 2)"
        );
    }
}

//! Bus configuration types for Stratum.
//!
//! `BusConfig` represents the top-level `stratum.toml`: the layer set, queue
//! and history capacities, and the emergence detector's settings including
//! its rule table. Every field has a default, so an empty file is valid.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::{kind, layer, LayerId};

/// Errors from validating a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one layer must be configured")]
    NoLayers,

    #[error("layer '{0}' is configured more than once")]
    DuplicateLayer(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{field} must not exceed {max}")]
    TooLarge { field: &'static str, max: u64 },
}

/// Upper bound for `queue_capacity`.
pub const MAX_QUEUE_CAPACITY: usize = 1 << 20;

/// Upper bound for `event_capacity`.
pub const MAX_EVENT_CAPACITY: usize = 1 << 20;

/// Upper bound for `detector.period_secs` (one week).
pub const MAX_PERIOD_SECS: u64 = 7 * 24 * 60 * 60;

fn at_most(field: &'static str, value: u64, max: u64) -> Result<(), ConfigError> {
    if value > max {
        return Err(ConfigError::TooLarge { field, max });
    }
    Ok(())
}

/// Top-level configuration for a layer bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Destinations known to the bus. Fixed once the bus is built.
    #[serde(default = "default_layers")]
    pub layers: Vec<LayerId>,

    /// Capacity of each layer's bounded queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Maximum number of history entries kept.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Buffer size of the bus event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Emergence detector settings.
    #[serde(default)]
    pub detector: DetectorConfig,
}

fn default_layers() -> Vec<LayerId> {
    vec![
        LayerId::new(layer::BASIC),
        LayerId::new(layer::REFLECTIVE),
        LayerId::new(layer::META_COGNITIVE),
    ]
}

fn default_queue_capacity() -> usize {
    100
}

fn default_history_capacity() -> usize {
    1000
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            layers: default_layers(),
            queue_capacity: default_queue_capacity(),
            history_capacity: default_history_capacity(),
            event_capacity: default_event_capacity(),
            detector: DetectorConfig::default(),
        }
    }
}

impl BusConfig {
    /// Check that the configuration can back a running bus.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layers.is_empty() {
            return Err(ConfigError::NoLayers);
        }
        let mut seen = HashSet::new();
        for layer in &self.layers {
            if !seen.insert(layer) {
                return Err(ConfigError::DuplicateLayer(layer.to_string()));
            }
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero("queue_capacity"));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Zero("history_capacity"));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Zero("event_capacity"));
        }
        at_most("queue_capacity", self.queue_capacity as u64, MAX_QUEUE_CAPACITY as u64)?;
        at_most("event_capacity", self.event_capacity as u64, MAX_EVENT_CAPACITY as u64)?;
        self.detector.validate()
    }
}

/// Settings for the periodic emergence sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Seconds between sweeps.
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,

    /// Number of most recent history entries inspected per sweep.
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Sweeps are skipped while history holds fewer entries than this.
    #[serde(default = "default_min_history")]
    pub min_history: usize,

    /// How many detected events are retained for querying.
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,

    /// Threshold rules evaluated on every sweep.
    #[serde(default = "default_rules")]
    pub rules: Vec<EmergenceRule>,
}

fn default_period_secs() -> u64 {
    30
}

fn default_window_size() -> usize {
    20
}

fn default_min_history() -> usize {
    10
}

fn default_event_log_capacity() -> usize {
    100
}

fn default_rules() -> Vec<EmergenceRule> {
    vec![
        EmergenceRule::new("reflective inquiry cascade")
            .threshold(kind::REFLECTION, 5)
            .threshold(kind::QUESTION, 3),
        EmergenceRule::new("pattern-driven attention shift")
            .threshold(kind::PATTERN, 3)
            .threshold(kind::ATTENTION, 2),
    ]
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            period_secs: default_period_secs(),
            window_size: default_window_size(),
            min_history: default_min_history(),
            event_log_capacity: default_event_log_capacity(),
            rules: default_rules(),
        }
    }
}

impl DetectorConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.period_secs == 0 {
            return Err(ConfigError::Zero("detector.period_secs"));
        }
        at_most("detector.period_secs", self.period_secs, MAX_PERIOD_SECS)?;
        if self.window_size == 0 {
            return Err(ConfigError::Zero("detector.window_size"));
        }
        if self.event_log_capacity == 0 {
            return Err(ConfigError::Zero("detector.event_log_capacity"));
        }
        Ok(())
    }
}

/// A named conjunction of per-type count thresholds.
///
/// The rule fires when, inside the inspected window, every listed message
/// type occurs strictly more often than its threshold. A rule without
/// thresholds never fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergenceRule {
    pub name: String,
    #[serde(default)]
    pub thresholds: BTreeMap<String, usize>,
}

impl EmergenceRule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            thresholds: BTreeMap::new(),
        }
    }

    /// Require `message_type` to occur more than `above` times.
    pub fn threshold(mut self, message_type: impl Into<String>, above: usize) -> Self {
        self.thresholds.insert(message_type.into(), above);
        self
    }

    /// Whether the rule holds for the given per-type counts.
    pub fn matches(&self, counts: &BTreeMap<String, usize>) -> bool {
        !self.thresholds.is_empty()
            && self
                .thresholds
                .iter()
                .all(|(ty, above)| counts.get(ty).copied().unwrap_or(0) > *above)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, usize)]) -> BTreeMap<String, usize> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_bus_config_default_values() {
        let config = BusConfig::default();
        assert_eq!(config.layers.len(), 3);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.history_capacity, 1000);
        assert_eq!(config.detector.period_secs, 30);
        assert_eq!(config.detector.window_size, 20);
        assert_eq!(config.detector.min_history, 10);
        assert_eq!(config.detector.rules.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bus_config_deserialize_with_defaults() {
        let config: BusConfig = toml::from_str("").unwrap();
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.layers[2], LayerId::meta_cognitive());
        assert_eq!(config.detector.rules[0].name, "reflective inquiry cascade");
    }

    #[test]
    fn test_bus_config_deserialize_with_values() {
        let toml_str = r#"
layers = ["sensory", "associative"]
queue_capacity = 8
history_capacity = 50

[detector]
period_secs = 5
window_size = 12

[[detector.rules]]
name = "anomaly storm"
thresholds = { anomaly = 4 }
"#;
        let config: BusConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.layers, vec![LayerId::new("sensory"), LayerId::new("associative")]);
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.detector.period(), Duration::from_secs(5));
        assert_eq!(config.detector.window_size, 12);
        assert_eq!(config.detector.min_history, 10);
        assert_eq!(config.detector.rules.len(), 1);
        assert_eq!(config.detector.rules[0].thresholds["anomaly"], 4);
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        let mut config = BusConfig::default();
        config.layers.clear();
        assert_eq!(config.validate(), Err(ConfigError::NoLayers));

        let mut config = BusConfig::default();
        config.layers.push(LayerId::basic());
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateLayer("basic".to_string()))
        );

        let mut config = BusConfig::default();
        config.queue_capacity = 0;
        assert_eq!(config.validate(), Err(ConfigError::Zero("queue_capacity")));

        let mut config = BusConfig::default();
        config.detector.window_size = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero("detector.window_size"))
        );
    }

    #[test]
    fn test_validate_rejects_queue_capacity_above_max() {
        let mut config = BusConfig::default();
        config.queue_capacity = MAX_QUEUE_CAPACITY;
        assert!(config.validate().is_ok());

        config.queue_capacity = usize::MAX;
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooLarge {
                field: "queue_capacity",
                max: MAX_QUEUE_CAPACITY as u64,
            })
        );
    }

    #[test]
    fn test_validate_rejects_event_capacity_above_max() {
        let mut config = BusConfig::default();
        config.event_capacity = MAX_EVENT_CAPACITY + 1;
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooLarge {
                field: "event_capacity",
                max: MAX_EVENT_CAPACITY as u64,
            })
        );
    }

    #[test]
    fn test_validate_rejects_period_above_max() {
        let mut config = BusConfig::default();
        config.detector.period_secs = u64::MAX;
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooLarge {
                field: "detector.period_secs",
                max: MAX_PERIOD_SECS,
            })
        );

        let mut config = BusConfig::default();
        config.detector.period_secs = MAX_PERIOD_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rule_requires_every_threshold_strictly_exceeded() {
        let rule = EmergenceRule::new("cascade")
            .threshold(kind::REFLECTION, 5)
            .threshold(kind::QUESTION, 3);

        assert!(rule.matches(&counts(&[("reflection", 6), ("question", 4)])));
        assert!(!rule.matches(&counts(&[("reflection", 5), ("question", 4)])));
        assert!(!rule.matches(&counts(&[("reflection", 9)])));
    }

    #[test]
    fn test_rule_without_thresholds_never_matches() {
        let rule = EmergenceRule::new("empty");
        assert!(!rule.matches(&counts(&[("reflection", 100)])));
    }
}

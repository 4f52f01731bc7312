//! Table-driven relay handler.
//!
//! A `RelayHandler` answers each incoming message with one follow-up per
//! matching `RelayRule`. Every follow-up carries a `depth` context entry one
//! higher than its trigger; once `max_depth` is reached the chain is absorbed,
//! which keeps self-feeding cascades finite.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::json;
use stratum_core::handler::{HandlerError, LayerHandler};
use stratum_types::message::{kind, LayerId, LayerMessage};

/// Context key holding the hop count of a cascade.
pub const DEPTH_KEY: &str = "depth";

/// Default maximum hop count for a cascade.
const DEFAULT_MAX_DEPTH: u64 = 6;

/// "On a message of kind `on`, emit a message of kind `emit` to layer `to`."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRule {
    pub on: String,
    pub emit: String,
    pub to: LayerId,
}

impl RelayRule {
    pub fn new(on: impl Into<String>, emit: impl Into<String>, to: impl Into<LayerId>) -> Self {
        Self {
            on: on.into(),
            emit: emit.into(),
            to: to.into(),
        }
    }
}

#[derive(Debug, Default)]
struct RelayStats {
    received: u64,
    emitted: u64,
    absorbed: u64,
    by_type: BTreeMap<String, u64>,
}

/// Handler that relays messages according to a rule table.
#[derive(Debug)]
pub struct RelayHandler {
    layer: LayerId,
    rules: Vec<RelayRule>,
    max_depth: u64,
    stats: Mutex<RelayStats>,
}

impl RelayHandler {
    pub fn new(layer: impl Into<LayerId>, rules: Vec<RelayRule>) -> Self {
        Self {
            layer: layer.into(),
            rules,
            max_depth: DEFAULT_MAX_DEPTH,
            stats: Mutex::new(RelayStats::default()),
        }
    }

    pub fn with_max_depth(mut self, max_depth: u64) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Relay preset for one of the default layers.
    ///
    /// Perceptions rise as patterns, patterns turn into reflections and
    /// attention shifts, reflections raise questions that are reflected on
    /// again. Returns `None` for layers outside the default set.
    pub fn cascade(layer: &LayerId) -> Option<Self> {
        let basic = LayerId::basic();
        let reflective = LayerId::reflective();
        let meta = LayerId::meta_cognitive();

        let rules = if *layer == basic {
            vec![
                RelayRule::new(kind::PERCEPTION, kind::PATTERN, reflective.clone()),
                RelayRule::new(kind::ATTENTION, kind::PERCEPTION, basic.clone()),
            ]
        } else if *layer == reflective {
            vec![
                RelayRule::new(kind::PATTERN, kind::REFLECTION, meta.clone()),
                RelayRule::new(kind::PATTERN, kind::ATTENTION, basic.clone()),
                RelayRule::new(kind::QUESTION, kind::REFLECTION, meta.clone()),
                RelayRule::new(kind::STRATEGY, kind::FEEDBACK, meta.clone()),
            ]
        } else if *layer == meta {
            vec![
                RelayRule::new(kind::REFLECTION, kind::QUESTION, reflective.clone()),
                RelayRule::new(kind::REFLECTION, kind::STRATEGY, reflective.clone()),
            ]
        } else {
            return None;
        };

        Some(Self::new(layer.clone(), rules))
    }

    pub fn layer(&self) -> &LayerId {
        &self.layer
    }

    fn relay(&self, message: &LayerMessage) -> Vec<LayerMessage> {
        let depth = message
            .context
            .get(DEPTH_KEY)
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0);
        if depth >= self.max_depth {
            return Vec::new();
        }

        self.rules
            .iter()
            .filter(|rule| rule.on == message.message_type)
            .map(|rule| {
                LayerMessage::new(
                    self.layer.clone(),
                    rule.to.clone(),
                    rule.emit.clone(),
                    message.content.clone(),
                    message.priority,
                )
                .with_context(DEPTH_KEY, json!(depth + 1))
                .with_context("cause", json!(message.id))
            })
            .collect()
    }
}

impl LayerHandler for RelayHandler {
    async fn process_message(
        &self,
        message: &LayerMessage,
    ) -> Result<Vec<LayerMessage>, HandlerError> {
        let follow_ups = self.relay(message);

        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.received += 1;
        *stats.by_type.entry(message.message_type.clone()).or_insert(0) += 1;
        if follow_ups.is_empty() {
            stats.absorbed += 1;
        }
        stats.emitted += follow_ups.len() as u64;
        Ok(follow_ups)
    }

    fn state(&self) -> serde_json::Value {
        let stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        json!({
            "layer": self.layer,
            "rules": self.rules.len(),
            "max_depth": self.max_depth,
            "received": stats.received,
            "emitted": stats.emitted,
            "absorbed": stats.absorbed,
            "by_type": stats.by_type,
        })
    }
}

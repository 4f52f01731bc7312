//! Threshold-rule scan over the most recent history window.
//!
//! A sweep counts message types in the last `window_size` history entries and
//! reports every configured rule whose thresholds are all exceeded. The window
//! is clamped to the history length, so any history at or above
//! `min_history` is safe to scan.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use stratum_types::config::DetectorConfig;
use stratum_types::event::EmergenceEvent;
use stratum_types::message::LayerMessage;
use uuid::Uuid;

use crate::bus::history::HistoryLog;

/// Evaluates the configured rule table against history windows.
#[derive(Debug, Clone)]
pub struct EmergenceDetector {
    config: DetectorConfig,
}

impl EmergenceDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run one sweep over `history`.
    ///
    /// Returns nothing while the history is shorter than `min_history`.
    pub fn sweep(&self, history: &HistoryLog) -> Vec<EmergenceEvent> {
        if history.len() < self.config.min_history {
            return Vec::new();
        }
        let window = history.recent(self.config.window_size);
        self.analyze(&window)
    }

    /// Tally message types in `window` and return one event per rule that holds.
    pub fn analyze(&self, window: &[Arc<LayerMessage>]) -> Vec<EmergenceEvent> {
        let counts = tally(window);
        let detected_at = Utc::now();

        self.config
            .rules
            .iter()
            .filter(|rule| rule.matches(&counts))
            .map(|rule| EmergenceEvent {
                id: Uuid::now_v7(),
                rule: rule.name.clone(),
                counts: rule
                    .thresholds
                    .keys()
                    .map(|ty| (ty.clone(), counts.get(ty).copied().unwrap_or(0)))
                    .collect(),
                window_size: window.len(),
                detected_at,
            })
            .collect()
    }
}

fn tally(window: &[Arc<LayerMessage>]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for message in window {
        *counts.entry(message.message_type.clone()).or_insert(0) += 1;
    }
    counts
}

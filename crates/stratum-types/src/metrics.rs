//! Point-in-time metrics snapshot of a layer bus.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::message::LayerId;

/// Counters and gauges read under a single lock acquisition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMetrics {
    /// Whether the bus was running when the snapshot was taken.
    pub running: bool,
    /// Messages dequeued and processed by workers (follow-ups not included).
    pub processed: u64,
    /// Total emergence rule firings.
    pub emergence_count: u64,
    /// Handler invocations that returned an error.
    pub handler_failures: u64,
    /// Current history length.
    pub history_size: usize,
    /// Messages waiting in each layer's queue.
    pub queue_depths: BTreeMap<LayerId, usize>,
}

impl BusMetrics {
    /// Sum of all queue depths.
    pub fn queued(&self) -> usize {
        self.queue_depths.values().sum()
    }
}

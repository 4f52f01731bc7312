//! Event types for the Stratum bus event stream.
//!
//! `BusEvent` is broadcast to subscribers whenever something noteworthy
//! happens off the caller's path: an emergence pattern is detected, a handler
//! fails, or a message is dropped inside a dispatch worker. All variants are
//! Clone + Send + Sync for use with tokio broadcast channels.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::LayerId;

/// One detection of an emergence rule over the history window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergenceEvent {
    /// UUIDv7 event ID.
    pub id: Uuid,
    /// Name of the rule that fired.
    pub rule: String,
    /// Window counts of the message types the rule names.
    pub counts: BTreeMap<String, usize>,
    /// Number of history entries that were inspected.
    pub window_size: usize,
    /// When the sweep detected the pattern.
    pub detected_at: DateTime<Utc>,
}

/// Notifications emitted by the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusEvent {
    /// An emergence rule held during a detector sweep.
    EmergenceDetected(EmergenceEvent),

    /// A handler returned an error; the message was dropped.
    HandlerFailed {
        layer: LayerId,
        message_id: Uuid,
        error: String,
    },

    /// A message reached a layer with no registered handler.
    MessageDropped { layer: LayerId, message_id: Uuid },

    /// A follow-up emitted by a handler could not be sent.
    FollowUpRejected {
        layer: LayerId,
        message_id: Uuid,
        error: String,
    },

    /// A handler registration replaced an existing handler.
    HandlerReplaced { layer: LayerId },
}

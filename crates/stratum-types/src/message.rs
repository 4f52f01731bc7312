//! Inter-layer messaging domain types for Stratum.
//!
//! Defines the `LayerMessage` envelope passed between processing layers, the
//! `LayerId` destination identifier, and the built-in message-kind vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// Identifier of a processing layer (a bus destination).
///
/// Layers are plain names so new ones can be added through configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(String);

impl LayerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn basic() -> Self {
        Self::new(layer::BASIC)
    }

    pub fn reflective() -> Self {
        Self::new(layer::REFLECTIVE)
    }

    pub fn meta_cognitive() -> Self {
        Self::new(layer::META_COGNITIVE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LayerId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for LayerId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Names of the default layers.
pub mod layer {
    pub const BASIC: &str = "basic";
    pub const REFLECTIVE: &str = "reflective";
    pub const META_COGNITIVE: &str = "meta_cognitive";
}

/// Built-in message-kind vocabulary.
///
/// `LayerMessage::message_type` is an open string tag; these are the kinds
/// the default rules and handlers understand.
pub mod kind {
    // Bottom-up
    pub const PERCEPTION: &str = "perception";
    pub const PATTERN: &str = "pattern";
    pub const ANOMALY: &str = "anomaly";
    pub const REFLECTION: &str = "reflection";
    pub const QUESTION: &str = "question";

    // Top-down
    pub const GOAL: &str = "goal";
    pub const ATTENTION: &str = "attention";
    pub const STRATEGY: &str = "strategy";
    pub const INHIBITION: &str = "inhibition";

    // Feedback
    pub const FEEDBACK: &str = "feedback";
    pub const EMERGENCE: &str = "emergence";
}

/// Direction a message kind travels through the layer stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFlow {
    /// Raw input rising toward reflection (perception, pattern, ...).
    BottomUp,
    /// Directives flowing down from higher layers (goal, attention, ...).
    TopDown,
    /// Responses to earlier messages.
    Feedback,
    /// Any tag outside the built-in vocabulary.
    Custom,
}

impl MessageFlow {
    /// Classify a message-type tag.
    pub fn of(message_type: &str) -> Self {
        match message_type {
            kind::PERCEPTION | kind::PATTERN | kind::ANOMALY | kind::REFLECTION
            | kind::QUESTION => MessageFlow::BottomUp,
            kind::GOAL | kind::ATTENTION | kind::STRATEGY | kind::INHIBITION => {
                MessageFlow::TopDown
            }
            kind::FEEDBACK | kind::EMERGENCE => MessageFlow::Feedback,
            _ => MessageFlow::Custom,
        }
    }
}

impl fmt::Display for MessageFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageFlow::BottomUp => write!(f, "bottom-up"),
            MessageFlow::TopDown => write!(f, "top-down"),
            MessageFlow::Feedback => write!(f, "feedback"),
            MessageFlow::Custom => write!(f, "custom"),
        }
    }
}

/// A message passed between layers.
///
/// Once handed to the bus a message is shared as `Arc<LayerMessage>` and is
/// never mutated again. Context entries are attached beforehand with
/// [`LayerMessage::with_context`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerMessage {
    /// UUIDv7 message ID.
    pub id: Uuid,
    /// When the message was created.
    pub timestamp: DateTime<Utc>,
    /// Layer that produced the message.
    pub from_layer: LayerId,
    /// Layer the message is routed to.
    pub to_layer: LayerId,
    /// Open-ended type tag (see [`kind`]).
    pub message_type: String,
    /// Free-text payload.
    pub content: String,
    /// Advisory priority. Never used for queue ordering.
    pub priority: f64,
    /// Arbitrary contextual key/value pairs.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub context: serde_json::Map<String, serde_json::Value>,
}

impl LayerMessage {
    /// Create a message with a fresh ID, the current timestamp and an empty
    /// context.
    pub fn new(
        from_layer: impl Into<LayerId>,
        to_layer: impl Into<LayerId>,
        message_type: impl Into<String>,
        content: impl Into<String>,
        priority: f64,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            from_layer: from_layer.into(),
            to_layer: to_layer.into(),
            message_type: message_type.into(),
            content: content.into(),
            priority,
            context: serde_json::Map::new(),
        }
    }

    /// Attach a context entry before the message is sent.
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Direction of this message's kind.
    pub fn flow(&self) -> MessageFlow {
        MessageFlow::of(&self.message_type)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

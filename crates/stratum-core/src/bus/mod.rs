//! Layer bus with bounded per-layer queues, dispatch workers, and history.
//!
//! - `controller` -- `LayerBus`: lifecycle, `send`, handler registration, metrics
//! - `queue` -- `QueueSet`, one bounded fail-fast queue per layer
//! - `registry` -- `HandlerRegistry`, layer to handler mapping
//! - `history` -- `HistoryLog`, bounded record of every send attempt
//! - `worker` -- dispatch and detector tasks

pub mod controller;
pub mod history;
pub mod queue;
pub mod registry;
mod worker;

pub use controller::{BusError, LayerBus};
pub use history::HistoryLog;
pub use queue::QueueSet;
pub use registry::HandlerRegistry;

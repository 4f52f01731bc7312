//! Stock `LayerHandler` implementations.
//!
//! - `relay` -- `RelayHandler`, a table-driven handler that turns incoming
//!   message kinds into follow-ups for other layers

pub mod relay;

pub use relay::{RelayHandler, RelayRule};

//! Layer bus runtime for Stratum.
//!
//! Routes `LayerMessage`s between a fixed set of layers, each drained by its
//! own dispatch worker and processed by a pluggable `LayerHandler`. Keeps a
//! bounded history of send attempts and periodically scans it for emergence
//! patterns. Depends only on `stratum-types` -- never on `stratum-infra`.

pub mod bus;
pub mod emergence;
pub mod event;
pub mod handler;

pub use bus::{BusError, LayerBus};
pub use handler::{BoxLayerHandler, HandlerError, LayerHandler};

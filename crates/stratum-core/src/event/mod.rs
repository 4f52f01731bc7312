//! Event stream for bus notifications.
//!
//! Provides an `EventBus` that distributes `BusEvent` notifications to all
//! subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::EventBus;

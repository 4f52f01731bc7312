//! Shared domain types for Stratum.
//!
//! This crate contains the types exchanged across the layer bus: the
//! `LayerMessage` envelope, layer identifiers, bus configuration, emergence
//! events and metrics snapshots.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod event;
pub mod message;
pub mod metrics;

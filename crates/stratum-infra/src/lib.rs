//! Infrastructure for Stratum: configuration loading and stock handlers.
//!
//! Implements the collaborator side of `stratum-core`: reading `stratum.toml`
//! into a `BusConfig`, and ready-made `LayerHandler` implementations.

pub mod config;
pub mod handler;

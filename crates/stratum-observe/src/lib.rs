//! Observability setup for Stratum.

pub mod tracing_setup;

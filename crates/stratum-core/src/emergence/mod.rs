//! Emergence detection over the bus history.
//!
//! - `detector` -- `EmergenceDetector`, the window tally and rule evaluation
//!   run by the bus on every sweep

pub mod detector;

pub use detector::EmergenceDetector;

//! Tracing and metrics setup shared by the Everest binaries and their tests.

pub mod metrics;
pub mod tracing;

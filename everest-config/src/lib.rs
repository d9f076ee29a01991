//! Configuration management for the Everest monitoring API.
//!
//! Provides runtime environment detection, hierarchical configuration loading from
//! YAML files and environment variables, and a serde-capable secret wrapper used for
//! credentials that travel through request bodies.

mod environment;
mod load;
mod secret;

pub use environment::*;
pub use load::*;
pub use secret::*;

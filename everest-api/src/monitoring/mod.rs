//! Monitoring instance lifecycle.
//!
//! A monitoring instance is persisted as two records at the same `namespace/name`
//! coordinate: a `MonitoringConfig` custom resource and an opaque `Secret` holding
//! the PMM API key. [`MonitoringInstanceManager`] keeps both consistent across
//! create, update and delete, and shapes the [`MonitoringInstance`] view returned to
//! callers, which has no room for the key.

mod instance;
mod manager;
pub mod policy;
pub mod secret;
pub mod validation;

pub use instance::*;
pub use manager::*;

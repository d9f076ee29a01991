//! Everest API service managing monitoring instances.
//!
//! A monitoring instance binds a namespace to a PMM server: a `MonitoringConfig`
//! custom resource holds the connection settings and a secret next to it holds the
//! API key. The API creates, lists, reads, updates and deletes both records together,
//! minting API keys on the PMM server when given a login, and filters what each
//! caller sees through an authorization gate.

pub mod authentication;
pub mod config;
pub mod k8s;
pub mod metrics;
pub mod monitoring;
pub mod pmm;
pub mod rbac;
pub mod routes;
pub mod startup;

//! Cluster resource store used by the monitoring instance manager.
//!
//! The manager only depends on the [`K8sClient`] trait. [`http::HttpK8sClient`] is the
//! [`kube`] backed implementation talking to the API server with the ambient
//! configuration (in-cluster or `~/.kube/config`); tests plug in an in-memory store.
//!
//! See [`base`] for the trait and its error type and [`resources`] for the custom
//! resource types.

mod base;
pub mod http;
pub mod resources;

pub use base::*;

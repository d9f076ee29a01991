use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use thiserror::Error;

use crate::k8s::resources::MonitoringConfig;

/// Errors emitted by the cluster resource store.
///
/// `NotFound` and `AlreadyExists` are split out of the raw API answers so callers
/// can branch on them without looking at status codes.
#[derive(Debug, Error)]
pub enum K8sError {
    /// The addressed object does not exist.
    #[error("the {kind} {namespace}/{name} was not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    /// An object already exists at the addressed coordinate.
    #[error("the {kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    /// A serialization or deserialization error while building or parsing
    /// Kubernetes resources.
    #[error("An error occurred in serde when dealing with K8s: {0}")]
    Serde(#[from] serde_json::Error),

    /// Any other error returned by the [`kube`] client.
    #[error("An error occurred with kube when dealing with K8s: {0}")]
    Kube(#[from] kube::Error),
}

impl K8sError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, K8sError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, K8sError::AlreadyExists { .. })
    }
}

/// Client interface over the two resource kinds owned by a monitoring instance:
/// the `MonitoringConfig` custom resource and its credentials `Secret`.
///
/// Every call is a single request against one coordinate and is atomic on the
/// server side; no call retries.
#[async_trait]
pub trait K8sClient: Send + Sync {
    /// Returns the [`MonitoringConfig`] at `namespace/name`.
    async fn get_monitoring_config(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<MonitoringConfig, K8sError>;

    /// Lists monitoring configs in `namespace`, or in every namespace when `None`.
    ///
    /// Items are returned in the order the API server returns them.
    async fn list_monitoring_configs(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<MonitoringConfig>, K8sError>;

    /// Creates a monitoring config. Fails with [`K8sError::AlreadyExists`] if one is
    /// already stored at the same coordinate.
    async fn create_monitoring_config(
        &self,
        config: &MonitoringConfig,
    ) -> Result<MonitoringConfig, K8sError>;

    /// Replaces a monitoring config previously read with
    /// [`K8sClient::get_monitoring_config`].
    async fn update_monitoring_config(
        &self,
        config: &MonitoringConfig,
    ) -> Result<MonitoringConfig, K8sError>;

    /// Deletes the monitoring config at `namespace/name`.
    async fn delete_monitoring_config(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), K8sError>;

    /// Returns the secret at `namespace/name`.
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, K8sError>;

    /// Creates a secret. Fails with [`K8sError::AlreadyExists`] if one is already
    /// stored at the same coordinate.
    async fn create_secret(&self, secret: &Secret) -> Result<(), K8sError>;

    /// Overwrites an existing secret.
    async fn update_secret(&self, secret: &Secret) -> Result<(), K8sError>;

    /// Deletes the secret at `namespace/name`.
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), K8sError>;

    /// Reports whether any database cluster references the monitoring config at
    /// `namespace/name`.
    ///
    /// Fails with [`K8sError::NotFound`] when the monitoring config itself does not
    /// exist.
    async fn is_monitoring_config_used(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<bool, K8sError>;
}

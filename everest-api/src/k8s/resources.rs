use std::fmt;

use kube::CustomResource;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind, ObjectMeta};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group shared by the Everest custom resources.
pub const EVEREST_GROUP: &str = "everest.percona.com";

/// API version of the Everest custom resources.
pub const EVEREST_VERSION: &str = "v1alpha1";

/// Kind of the database cluster resources that may reference a monitoring config.
pub const DATABASE_CLUSTER_KIND: &str = "DatabaseCluster";

/// Plural of [`DATABASE_CLUSTER_KIND`].
pub const DATABASE_CLUSTER_PLURAL: &str = "databaseclusters";

/// Backend kinds a monitoring config can point to.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MonitoringType {
    /// Percona Monitoring and Management.
    #[default]
    Pmm,
}

impl fmt::Display for MonitoringType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitoringType::Pmm => write!(f, "pmm"),
        }
    }
}

/// Connection settings of a PMM server.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PmmConfig {
    /// Base URL of the PMM server.
    pub url: String,

    /// PMM client image injected by the operator, left untouched by the API.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
}

/// Persisted configuration of a monitoring instance.
///
/// Lives at the same `namespace/name` coordinate as the credentials secret it
/// references through `credentialsSecretName`.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "everest.percona.com",
    version = "v1alpha1",
    kind = "MonitoringConfig",
    plural = "monitoringconfigs",
    shortname = "mc",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringConfigSpec {
    #[serde(rename = "type")]
    pub monitoring_type: MonitoringType,

    #[serde(default)]
    pub pmm: PmmConfig,

    /// Name of the secret holding the API key, always the config's own name.
    pub credentials_secret_name: String,

    /// Namespaces whose database clusters may use this monitoring config.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_namespaces: Vec<String>,

    /// Whether the backend certificate is verified. Absent means `true`.
    #[serde(rename = "verifyTLS", default, skip_serializing_if = "Option::is_none")]
    pub verify_tls: Option<bool>,
}

impl MonitoringConfig {
    /// Builds a monitoring config addressed at `namespace/name`.
    pub fn namespaced(namespace: &str, name: &str, spec: MonitoringConfigSpec) -> Self {
        MonitoringConfig {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..ObjectMeta::default()
            },
            spec,
        }
    }
}

/// Dynamic API resource of the database clusters checked by the usage guard.
pub fn database_cluster_resource() -> ApiResource {
    let gvk = GroupVersionKind::gvk(EVEREST_GROUP, EVEREST_VERSION, DATABASE_CLUSTER_KIND);
    ApiResource::from_gvk_with_plural(&gvk, DATABASE_CLUSTER_PLURAL)
}

/// Returns `true` if `database_cluster` uses the monitoring config named
/// `monitoring_config_name`.
pub fn references_monitoring_config(
    database_cluster: &DynamicObject,
    monitoring_config_name: &str,
) -> bool {
    database_cluster
        .data
        .pointer("/spec/monitoring/monitoringConfigName")
        .and_then(|value| value.as_str())
        .is_some_and(|name| name == monitoring_config_name)
}

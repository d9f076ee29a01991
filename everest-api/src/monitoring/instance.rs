use everest_config::SerializableSecretString;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::k8s::resources::{MonitoringConfig, MonitoringType};

/// Default of `verifyTLS` when neither the request nor the stored record carry it.
pub const DEFAULT_VERIFY_TLS: bool = true;

/// PMM credentials supplied by the caller: either an existing API key or a login
/// used to mint a new one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PmmCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<SerializableSecretString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "admin")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<SerializableSecretString>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMonitoringInstanceRequest {
    #[serde(rename = "type")]
    #[schema(value_type = String, example = "pmm")]
    pub monitoring_type: MonitoringType,
    #[schema(example = "pmm-prod", required = true)]
    pub name: String,
    #[schema(example = "https://pmm.example.com", required = true)]
    pub url: String,
    #[serde(default)]
    pub allowed_namespaces: Vec<String>,
    #[serde(rename = "verifyTLS", default, skip_serializing_if = "Option::is_none")]
    pub verify_tls: Option<bool>,
    #[schema(required = true)]
    pub pmm: Option<PmmCredentials>,
}

/// Partial update: absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMonitoringInstanceRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "https://pmm.example.com")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_namespaces: Option<Vec<String>>,
    #[serde(rename = "verifyTLS", default, skip_serializing_if = "Option::is_none")]
    pub verify_tls: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmm: Option<PmmCredentials>,
}

/// Monitoring instance as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringInstance {
    #[serde(rename = "type")]
    #[schema(value_type = String, example = "pmm")]
    pub monitoring_type: MonitoringType,
    #[schema(example = "pmm-prod")]
    pub name: String,
    #[schema(example = "team-a")]
    pub namespace: String,
    #[schema(example = "https://pmm.example.com")]
    pub url: String,
    pub allowed_namespaces: Vec<String>,
    #[serde(rename = "verifyTLS")]
    pub verify_tls: bool,
}

impl From<&MonitoringConfig> for MonitoringInstance {
    fn from(config: &MonitoringConfig) -> Self {
        MonitoringInstance {
            monitoring_type: config.spec.monitoring_type,
            name: config.metadata.name.clone().unwrap_or_default(),
            namespace: config.metadata.namespace.clone().unwrap_or_default(),
            url: config.spec.pmm.url.clone(),
            allowed_namespaces: config.spec.allowed_namespaces.clone(),
            verify_tls: config.spec.verify_tls.unwrap_or(DEFAULT_VERIFY_TLS),
        }
    }
}

impl UpdateMonitoringInstanceRequest {
    /// Applies the fields present in the request to `config`.
    pub fn apply_to(&self, config: &mut MonitoringConfig) {
        if let Some(url) = &self.url {
            config.spec.pmm.url = url.clone();
        }
        if let Some(allowed_namespaces) = &self.allowed_namespaces {
            config.spec.allowed_namespaces = allowed_namespaces.clone();
        }
        if let Some(verify_tls) = self.verify_tls {
            config.spec.verify_tls = Some(verify_tls);
        }
    }
}

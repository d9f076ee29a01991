use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::debug;

use crate::k8s::resources::{
    MonitoringConfig, database_cluster_resource, references_monitoring_config,
};
use crate::k8s::{K8sClient, K8sError};

const MONITORING_CONFIG_KIND: &str = "MonitoringConfig";
const SECRET_KIND: &str = "Secret";

/// [`K8sClient`] implementation backed by the [`kube`] crate.
#[derive(Clone)]
pub struct HttpK8sClient {
    client: Client,
}

impl HttpK8sClient {
    /// Connects with the ambient configuration: in-cluster service account first,
    /// then the local kubeconfig.
    pub async fn new() -> Result<HttpK8sClient, K8sError> {
        let client = Client::try_default().await?;

        Ok(HttpK8sClient { client })
    }

    fn monitoring_configs(&self, namespace: &str) -> Api<MonitoringConfig> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Splits `NotFound` and `AlreadyExists` answers out of a raw [`kube::Error`].
fn classify(err: kube::Error, kind: &'static str, namespace: &str, name: &str) -> K8sError {
    match err {
        kube::Error::Api(response) if response.code == 404 => K8sError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(response) if response.code == 409 && response.reason == "AlreadyExists" => {
            K8sError::AlreadyExists {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            }
        }
        err => K8sError::Kube(err),
    }
}

fn secret_coordinate(secret: &Secret) -> (String, String) {
    (secret.namespace().unwrap_or_default(), secret.name_any())
}

fn config_coordinate(config: &MonitoringConfig) -> (String, String) {
    (config.namespace().unwrap_or_default(), config.name_any())
}

#[async_trait]
impl K8sClient for HttpK8sClient {
    async fn get_monitoring_config(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<MonitoringConfig, K8sError> {
        self.monitoring_configs(namespace)
            .get(name)
            .await
            .map_err(|e| classify(e, MONITORING_CONFIG_KIND, namespace, name))
    }

    async fn list_monitoring_configs(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<MonitoringConfig>, K8sError> {
        let api: Api<MonitoringConfig> = match namespace {
            Some(namespace) => self.monitoring_configs(namespace),
            None => Api::all(self.client.clone()),
        };
        let list = api.list(&ListParams::default()).await?;

        Ok(list.items)
    }

    async fn create_monitoring_config(
        &self,
        config: &MonitoringConfig,
    ) -> Result<MonitoringConfig, K8sError> {
        let (namespace, name) = config_coordinate(config);
        self.monitoring_configs(&namespace)
            .create(&PostParams::default(), config)
            .await
            .map_err(|e| classify(e, MONITORING_CONFIG_KIND, &namespace, &name))
    }

    async fn update_monitoring_config(
        &self,
        config: &MonitoringConfig,
    ) -> Result<MonitoringConfig, K8sError> {
        let (namespace, name) = config_coordinate(config);
        self.monitoring_configs(&namespace)
            .replace(&name, &PostParams::default(), config)
            .await
            .map_err(|e| classify(e, MONITORING_CONFIG_KIND, &namespace, &name))
    }

    async fn delete_monitoring_config(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), K8sError> {
        self.monitoring_configs(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| classify(e, MONITORING_CONFIG_KIND, namespace, name))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, K8sError> {
        self.secrets(namespace)
            .get(name)
            .await
            .map_err(|e| classify(e, SECRET_KIND, namespace, name))
    }

    async fn create_secret(&self, secret: &Secret) -> Result<(), K8sError> {
        let (namespace, name) = secret_coordinate(secret);
        self.secrets(&namespace)
            .create(&PostParams::default(), secret)
            .await
            .map(|_| ())
            .map_err(|e| classify(e, SECRET_KIND, &namespace, &name))
    }

    async fn update_secret(&self, secret: &Secret) -> Result<(), K8sError> {
        let (namespace, name) = secret_coordinate(secret);
        self.secrets(&namespace)
            .replace(&name, &PostParams::default(), secret)
            .await
            .map(|_| ())
            .map_err(|e| classify(e, SECRET_KIND, &namespace, &name))
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), K8sError> {
        self.secrets(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| classify(e, SECRET_KIND, namespace, name))
    }

    async fn is_monitoring_config_used(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<bool, K8sError> {
        // A missing monitoring config must surface as NotFound.
        self.get_monitoring_config(namespace, name).await?;

        let database_clusters: Api<DynamicObject> = Api::namespaced_with(
            self.client.clone(),
            namespace,
            &database_cluster_resource(),
        );
        let list = match database_clusters.list(&ListParams::default()).await {
            Ok(list) => list,
            Err(kube::Error::Api(response)) if response.code == 404 => {
                debug!(namespace, "database cluster resource is not served, nothing can use the monitoring config");
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };

        Ok(list
            .items
            .iter()
            .any(|database_cluster| references_monitoring_config(database_cluster, name)))
    }
}

use std::sync::Arc;

use kube::ResourceExt;
use metrics::counter;
use secrecy::SecretString;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::k8s::resources::{MonitoringConfig, MonitoringConfigSpec, PmmConfig};
use crate::k8s::{K8sClient, K8sError};
use crate::metrics::{
    EVEREST_MONITORING_INSTANCE_OPERATIONS_TOTAL, EVEREST_MONITORING_SECRET_ROLLBACKS_TOTAL,
    EVEREST_PMM_API_KEYS_CREATED_TOTAL, FAILURE, OPERATION, OUTCOME, SUCCESS, register_metrics,
};
use crate::monitoring::policy::{AuthorizationPolicy, ObjectPolicy};
use crate::monitoring::secret::{build_credentials_secret, is_credentials_secret_of};
use crate::monitoring::validation::{Credentials, ValidationError, validate_namespace};
use crate::monitoring::{
    CreateMonitoringInstanceRequest, DEFAULT_VERIFY_TLS, MonitoringInstance,
    UpdateMonitoringInstanceRequest,
};
use crate::pmm::{ApiKeyIssuer, PmmError, PmmLogin};
use crate::rbac::{
    Action, AuthorizationError, Authorizer, RESOURCE_MONITORING_INSTANCES, object_name,
};

#[derive(Debug, Error)]
pub enum MonitoringInstanceError {
    #[error(transparent)]
    InvalidInput(#[from] ValidationError),

    #[error("Monitoring instance {name} already exists in namespace {namespace}")]
    AlreadyExists { namespace: String, name: String },

    #[error("Monitoring instance is not found")]
    NotFound { namespace: String, name: String },

    #[error("Monitoring instance {name} is used")]
    InUse { namespace: String, name: String },

    #[error("User {user} is not allowed to {action} monitoring instance {object}")]
    Forbidden {
        user: String,
        action: Action,
        object: String,
    },

    #[error("Could not create an API key in PMM: {0}")]
    Pmm(#[from] PmmError),

    #[error("A K8s error occurred: {0}")]
    K8s(#[from] K8sError),

    #[error("An authorization error occurred: {0}")]
    Authorization(#[from] AuthorizationError),
}

impl MonitoringInstanceError {
    fn not_found(namespace: &str, name: &str) -> Self {
        MonitoringInstanceError::NotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    fn already_exists(namespace: &str, name: &str) -> Self {
        MonitoringInstanceError::AlreadyExists {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Short label of the error used as a metric outcome.
    pub fn kind(&self) -> &'static str {
        match self {
            MonitoringInstanceError::InvalidInput(_) => "invalid_input",
            MonitoringInstanceError::AlreadyExists { .. } => "conflict",
            MonitoringInstanceError::NotFound { .. } => "not_found",
            MonitoringInstanceError::InUse { .. } => "in_use",
            MonitoringInstanceError::Forbidden { .. } => "forbidden",
            MonitoringInstanceError::Pmm(_) => "pmm_error",
            MonitoringInstanceError::K8s(_) => "k8s_error",
            MonitoringInstanceError::Authorization(_) => "authorization_error",
        }
    }

    /// Returns `true` when a collaborator failed rather than the request being
    /// rejected.
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            MonitoringInstanceError::Pmm(_)
                | MonitoringInstanceError::K8s(_)
                | MonitoringInstanceError::Authorization(_)
        )
    }
}

/// Result of looking up a coordinate that must be free.
enum Lookup {
    Exists,
    Absent,
}

/// Creates, lists, reads, updates and deletes monitoring instances.
///
/// Holds no state of its own: every operation reads fresh from the cluster and relies
/// on the per-object atomicity of the API server. Dropping an operation's future
/// abandons its in-flight remote calls.
#[derive(Clone)]
pub struct MonitoringInstanceManager {
    k8s: Arc<dyn K8sClient>,
    issuer: Arc<dyn ApiKeyIssuer>,
    authorizer: Arc<dyn Authorizer>,
    policy: AuthorizationPolicy,
}

impl MonitoringInstanceManager {
    pub fn new(
        k8s: Arc<dyn K8sClient>,
        issuer: Arc<dyn ApiKeyIssuer>,
        authorizer: Arc<dyn Authorizer>,
        policy: AuthorizationPolicy,
    ) -> MonitoringInstanceManager {
        register_metrics();

        MonitoringInstanceManager {
            k8s,
            issuer,
            authorizer,
            policy,
        }
    }

    /// Creates the monitoring instance described by `request` in `namespace`.
    ///
    /// The credentials secret is written before the monitoring config and deleted
    /// again if the config cannot be created.
    pub async fn create(
        &self,
        user: &str,
        namespace: &str,
        request: &CreateMonitoringInstanceRequest,
    ) -> Result<MonitoringInstance, MonitoringInstanceError> {
        let result = self.try_create(user, namespace, request).await;
        finish("create", namespace, result)
    }

    /// Lists the monitoring instances of `namespace`, or of every namespace when
    /// `None`, in the order returned by the cluster.
    pub async fn list(
        &self,
        user: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<MonitoringInstance>, MonitoringInstanceError> {
        let result = self.try_list(user, namespace).await;
        finish("list", namespace.unwrap_or("*"), result)
    }

    pub async fn get(
        &self,
        user: &str,
        namespace: &str,
        name: &str,
    ) -> Result<MonitoringInstance, MonitoringInstanceError> {
        let result = self.try_get(user, namespace, name).await;
        finish("get", namespace, result)
    }

    /// Applies the fields present in `request` to the monitoring instance at
    /// `namespace/name`.
    ///
    /// New credentials are written to the secret before the config is updated. The
    /// secret is not restored if the config update fails afterwards.
    pub async fn update(
        &self,
        user: &str,
        namespace: &str,
        name: &str,
        request: &UpdateMonitoringInstanceRequest,
    ) -> Result<MonitoringInstance, MonitoringInstanceError> {
        let result = self.try_update(user, namespace, name, request).await;
        finish("update", namespace, result)
    }

    /// Deletes the monitoring instance at `namespace/name` unless a database cluster
    /// still uses it.
    ///
    /// A secret left behind by an interrupted delete is removed when the delete is
    /// issued again.
    pub async fn delete(
        &self,
        user: &str,
        namespace: &str,
        name: &str,
    ) -> Result<(), MonitoringInstanceError> {
        let result = self.try_delete(user, namespace, name).await;
        finish("delete", namespace, result)
    }

    /// Writes the credentials secret at `namespace/name`, overwriting an existing one.
    pub async fn upsert_credentials_secret(
        &self,
        namespace: &str,
        name: &str,
        api_key: &SecretString,
    ) -> Result<(), K8sError> {
        let secret = build_credentials_secret(namespace, name, api_key);

        match self.k8s.create_secret(&secret).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_already_exists() => {
                debug!(namespace, name, "credentials secret already exists, updating it");
                self.k8s.update_secret(&secret).await
            }
            Err(err) => Err(err),
        }
    }

    async fn try_create(
        &self,
        user: &str,
        namespace: &str,
        request: &CreateMonitoringInstanceRequest,
    ) -> Result<MonitoringInstance, MonitoringInstanceError> {
        validate_namespace(namespace)?;
        let credentials = request.validate()?;
        let name = request.name.as_str();

        self.enforce(self.policy.create, user, Action::Create, namespace, name)
            .await?;

        if let Lookup::Exists = self.lookup(namespace, name).await? {
            return Err(MonitoringInstanceError::already_exists(namespace, name));
        }

        let verify_tls = request.verify_tls.unwrap_or(DEFAULT_VERIFY_TLS);
        let api_key = self
            .resolve_api_key(&request.url, name, credentials, verify_tls)
            .await?;

        self.upsert_credentials_secret(namespace, name, &api_key)
            .await?;

        let config = MonitoringConfig::namespaced(
            namespace,
            name,
            MonitoringConfigSpec {
                monitoring_type: request.monitoring_type,
                pmm: PmmConfig {
                    url: request.url.clone(),
                    image: String::new(),
                },
                credentials_secret_name: name.to_string(),
                allowed_namespaces: request.allowed_namespaces.clone(),
                verify_tls: Some(verify_tls),
            },
        );

        let created = match self.k8s.create_monitoring_config(&config).await {
            Ok(created) => created,
            // The secret now belongs to the instance that won the race.
            Err(err) if err.is_already_exists() => {
                warn!(
                    namespace,
                    name, "monitoring config was created concurrently, keeping the secret"
                );
                return Err(MonitoringInstanceError::already_exists(namespace, name));
            }
            Err(err) => {
                self.rollback_credentials_secret(namespace, name).await;
                return Err(err.into());
            }
        };

        info!(namespace, name, "monitoring instance created");

        Ok(MonitoringInstance::from(&created))
    }

    async fn try_list(
        &self,
        user: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<MonitoringInstance>, MonitoringInstanceError> {
        if let Some(namespace) = namespace {
            validate_namespace(namespace)?;
        }

        let configs = self.k8s.list_monitoring_configs(namespace).await?;

        let mut instances = Vec::with_capacity(configs.len());
        for config in &configs {
            let config_namespace = config.namespace().unwrap_or_default();
            let config_name = config.name_any();

            let allowed = self
                .is_allowed(
                    self.policy.list,
                    user,
                    Action::Read,
                    &config_namespace,
                    &config_name,
                )
                .await?;
            if !allowed {
                if self.policy.list == ObjectPolicy::Filter {
                    continue;
                }
                return Err(forbidden(
                    user,
                    Action::Read,
                    &config_namespace,
                    &config_name,
                ));
            }

            instances.push(MonitoringInstance::from(config));
        }

        Ok(instances)
    }

    async fn try_get(
        &self,
        user: &str,
        namespace: &str,
        name: &str,
    ) -> Result<MonitoringInstance, MonitoringInstanceError> {
        validate_namespace(namespace)?;

        // A denied read looks exactly like a missing instance.
        if !self
            .is_allowed(self.policy.get, user, Action::Read, namespace, name)
            .await?
        {
            return Err(MonitoringInstanceError::not_found(namespace, name));
        }

        let config = self.get_existing(namespace, name).await?;

        Ok(MonitoringInstance::from(&config))
    }

    async fn try_update(
        &self,
        user: &str,
        namespace: &str,
        name: &str,
        request: &UpdateMonitoringInstanceRequest,
    ) -> Result<MonitoringInstance, MonitoringInstanceError> {
        validate_namespace(namespace)?;
        let credentials = request.validate()?;

        self.enforce(self.policy.update, user, Action::Update, namespace, name)
            .await?;

        let mut config = self.get_existing(namespace, name).await?;

        if let Some(credentials) = credentials {
            let url = request.url.as_deref().unwrap_or(&config.spec.pmm.url);
            let verify_tls = request
                .verify_tls
                .or(config.spec.verify_tls)
                .unwrap_or(DEFAULT_VERIFY_TLS);

            let api_key = self
                .resolve_api_key(url, name, credentials, verify_tls)
                .await?;
            self.upsert_credentials_secret(namespace, name, &api_key)
                .await?;
        }

        request.apply_to(&mut config);

        let updated = match self.k8s.update_monitoring_config(&config).await {
            Ok(updated) => updated,
            Err(err) if err.is_not_found() => {
                return Err(MonitoringInstanceError::not_found(namespace, name));
            }
            Err(err) => return Err(err.into()),
        };

        info!(namespace, name, "monitoring instance updated");

        Ok(MonitoringInstance::from(&updated))
    }

    async fn try_delete(
        &self,
        user: &str,
        namespace: &str,
        name: &str,
    ) -> Result<(), MonitoringInstanceError> {
        validate_namespace(namespace)?;

        self.enforce(self.policy.delete, user, Action::Delete, namespace, name)
            .await?;

        match self.k8s.is_monitoring_config_used(namespace, name).await {
            Ok(false) => {}
            Ok(true) => {
                return Err(MonitoringInstanceError::InUse {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                });
            }
            Err(err) if err.is_not_found() => {
                return self.delete_orphaned_secret(namespace, name).await;
            }
            Err(err) => return Err(err.into()),
        }

        match self.k8s.delete_monitoring_config(namespace, name).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                return Err(MonitoringInstanceError::not_found(namespace, name));
            }
            Err(err) => return Err(err.into()),
        }

        match self.k8s.delete_secret(namespace, name).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                debug!(namespace, name, "credentials secret was already deleted");
            }
            Err(err) => return Err(err.into()),
        }

        info!(namespace, name, "monitoring instance deleted");

        Ok(())
    }

    /// Finishes a delete that was interrupted after the config removal by deleting
    /// the secret left behind. Only a secret this service wrote for `name` is
    /// removed; any other secret at the coordinate is left alone and the instance
    /// is reported as not found.
    async fn delete_orphaned_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), MonitoringInstanceError> {
        let secret = match self.k8s.get_secret(namespace, name).await {
            Ok(secret) => secret,
            Err(err) if err.is_not_found() => {
                return Err(MonitoringInstanceError::not_found(namespace, name));
            }
            Err(err) => return Err(err.into()),
        };

        if !is_credentials_secret_of(&secret, name) {
            debug!(namespace, name, "secret is not the credentials of a monitoring instance");
            return Err(MonitoringInstanceError::not_found(namespace, name));
        }

        match self.k8s.delete_secret(namespace, name).await {
            Ok(()) => {
                info!(namespace, name, "deleted the credentials secret of a removed monitoring config");
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                Err(MonitoringInstanceError::not_found(namespace, name))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Reads the monitoring config at `namespace/name`, mapping a miss to
    /// [`MonitoringInstanceError::NotFound`].
    async fn get_existing(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<MonitoringConfig, MonitoringInstanceError> {
        match self.k8s.get_monitoring_config(namespace, name).await {
            Ok(config) => Ok(config),
            Err(err) if err.is_not_found() => {
                Err(MonitoringInstanceError::not_found(namespace, name))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn lookup(&self, namespace: &str, name: &str) -> Result<Lookup, K8sError> {
        match self.k8s.get_monitoring_config(namespace, name).await {
            Ok(_) => Ok(Lookup::Exists),
            Err(err) if err.is_not_found() => Ok(Lookup::Absent),
            Err(err) => Err(err),
        }
    }

    /// Returns the API key to store, minting one on the PMM server at `url` when a
    /// login was given.
    async fn resolve_api_key(
        &self,
        url: &str,
        name: &str,
        credentials: Credentials,
        verify_tls: bool,
    ) -> Result<SecretString, MonitoringInstanceError> {
        let (user, password) = match credentials {
            Credentials::ApiKey(api_key) => return Ok(api_key),
            Credentials::Login { user, password } => (user, password),
        };

        let label = format!("everest-{name}-{}", Uuid::new_v4());
        debug!(url, %label, "minting a pmm api key");

        let api_key = self
            .issuer
            .create_api_key(
                url,
                &label,
                PmmLogin {
                    user: &user,
                    password: &password,
                },
                !verify_tls,
            )
            .await?;
        counter!(EVEREST_PMM_API_KEYS_CREATED_TOTAL).increment(1);

        Ok(api_key)
    }

    /// Deletes the credentials secret written by a create whose config write failed.
    ///
    /// A failure is logged and otherwise ignored: the caller reports the config error.
    async fn rollback_credentials_secret(&self, namespace: &str, name: &str) {
        match self.k8s.delete_secret(namespace, name).await {
            Ok(()) => {
                counter!(EVEREST_MONITORING_SECRET_ROLLBACKS_TOTAL, OUTCOME => SUCCESS)
                    .increment(1);
                info!(namespace, name, "credentials secret rolled back");
            }
            Err(err) if err.is_not_found() => {
                counter!(EVEREST_MONITORING_SECRET_ROLLBACKS_TOTAL, OUTCOME => SUCCESS)
                    .increment(1);
            }
            Err(err) => {
                counter!(EVEREST_MONITORING_SECRET_ROLLBACKS_TOTAL, OUTCOME => FAILURE)
                    .increment(1);
                error!(
                    namespace,
                    name,
                    error = %err,
                    "could not roll back the credentials secret, it is left behind"
                );
            }
        }
    }

    /// Asks the authorizer about one object. A deny is `Ok(false)`, any other
    /// authorizer error is returned.
    async fn is_allowed(
        &self,
        policy: ObjectPolicy,
        user: &str,
        action: Action,
        namespace: &str,
        name: &str,
    ) -> Result<bool, MonitoringInstanceError> {
        if policy == ObjectPolicy::Unchecked {
            return Ok(true);
        }

        let object = object_name(namespace, name);
        match self
            .authorizer
            .enforce(user, RESOURCE_MONITORING_INSTANCES, action, &object)
            .await
        {
            Ok(()) => Ok(true),
            Err(err) if err.is_insufficient_permissions() => {
                debug!(user, %action, %object, "access denied");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn enforce(
        &self,
        policy: ObjectPolicy,
        user: &str,
        action: Action,
        namespace: &str,
        name: &str,
    ) -> Result<(), MonitoringInstanceError> {
        if self
            .is_allowed(policy, user, action, namespace, name)
            .await?
        {
            return Ok(());
        }

        Err(forbidden(user, action, namespace, name))
    }
}

fn forbidden(user: &str, action: Action, namespace: &str, name: &str) -> MonitoringInstanceError {
    MonitoringInstanceError::Forbidden {
        user: user.to_string(),
        action,
        object: object_name(namespace, name),
    }
}

/// Counts the outcome of an operation and logs upstream failures in full.
fn finish<T>(
    operation: &'static str,
    namespace: &str,
    result: Result<T, MonitoringInstanceError>,
) -> Result<T, MonitoringInstanceError> {
    let outcome = match &result {
        Ok(_) => SUCCESS,
        Err(err) => err.kind(),
    };
    counter!(
        EVEREST_MONITORING_INSTANCE_OPERATIONS_TOTAL,
        OPERATION => operation,
        OUTCOME => outcome
    )
    .increment(1);

    if let Err(err) = &result {
        if err.is_upstream_failure() {
            error!(operation, namespace, error = %err, "monitoring instance operation failed");
        } else {
            debug!(operation, namespace, error = %err, "monitoring instance operation rejected");
        }
    }

    result
}

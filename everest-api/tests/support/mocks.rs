#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use everest_api::k8s::resources::{MonitoringConfig, MonitoringConfigSpec, MonitoringType, PmmConfig};
use everest_api::k8s::{K8sClient, K8sError};
use everest_api::pmm::{ApiKeyIssuer, PmmError, PmmLogin};
use everest_api::rbac::{Action, AuthorizationError, Authorizer};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use kube::api::ObjectMeta;
use secrecy::{ExposeSecret, SecretString};

/// Operations of [`MockK8sClient`] that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum K8sOperation {
    GetMonitoringConfig,
    ListMonitoringConfigs,
    CreateMonitoringConfig,
    UpdateMonitoringConfig,
    DeleteMonitoringConfig,
    GetSecret,
    CreateSecret,
    UpdateSecret,
    DeleteSecret,
    IsMonitoringConfigUsed,
}

/// Error returned by an operation made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedError {
    Internal,
    AlreadyExists,
    NotFound,
}

type Coordinate = (String, String);

fn coordinate(namespace: &str, name: &str) -> Coordinate {
    (namespace.to_string(), name.to_string())
}

#[derive(Default)]
struct K8sState {
    // Kept in insertion order, which is the order lists are returned in.
    configs: Vec<MonitoringConfig>,
    secrets: BTreeMap<Coordinate, Secret>,
    used: HashSet<Coordinate>,
    failures: HashMap<K8sOperation, InjectedError>,
    operations: Vec<String>,
}

impl K8sState {
    fn config_index(&self, namespace: &str, name: &str) -> Option<usize> {
        self.configs.iter().position(|config| {
            config.namespace().as_deref() == Some(namespace) && config.name_any() == name
        })
    }

    /// Records the call and returns the injected error for `operation`, if any.
    fn enter(
        &mut self,
        operation: K8sOperation,
        kind: &'static str,
        namespace: &str,
        name: &str,
    ) -> Result<(), K8sError> {
        self.operations
            .push(format!("{operation:?} {namespace}/{name}"));

        match self.failures.get(&operation) {
            None => Ok(()),
            Some(InjectedError::Internal) => Err(internal_error()),
            Some(InjectedError::AlreadyExists) => Err(K8sError::AlreadyExists {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
            Some(InjectedError::NotFound) => Err(not_found(kind, namespace, name)),
        }
    }
}

fn internal_error() -> K8sError {
    let err = serde_json::from_str::<serde_json::Value>("{")
        .expect_err("an unterminated object must not parse");
    K8sError::Serde(err)
}

fn not_found(kind: &'static str, namespace: &str, name: &str) -> K8sError {
    K8sError::NotFound {
        kind,
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

const MONITORING_CONFIG: &str = "MonitoringConfig";
const SECRET: &str = "Secret";

/// In-memory cluster with the create, update and delete semantics of the API server.
#[derive(Default)]
pub struct MockK8sClient {
    state: Mutex<K8sState>,
}

impl MockK8sClient {
    fn state(&self) -> MutexGuard<'_, K8sState> {
        self.state.lock().expect("mock k8s state poisoned")
    }

    pub fn fail(&self, operation: K8sOperation, error: InjectedError) {
        self.state().failures.insert(operation, error);
    }

    pub fn recover(&self, operation: K8sOperation) {
        self.state().failures.remove(&operation);
    }

    /// Marks the monitoring config at `namespace/name` as used by a database cluster.
    pub fn mark_used(&self, namespace: &str, name: &str) {
        self.state().used.insert(coordinate(namespace, name));
    }

    pub fn seed_config(&self, config: MonitoringConfig) {
        self.state().configs.push(config);
    }

    pub fn seed_secret(&self, secret: Secret) {
        let key = coordinate(&secret.namespace().unwrap_or_default(), &secret.name_any());
        self.state().secrets.insert(key, secret);
    }

    pub fn config(&self, namespace: &str, name: &str) -> Option<MonitoringConfig> {
        let state = self.state();
        state
            .config_index(namespace, name)
            .map(|index| state.configs[index].clone())
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.state()
            .secrets
            .get(&coordinate(namespace, name))
            .cloned()
    }

    /// Returns the string data of the secret at `namespace/name`.
    pub fn secret_data(&self, namespace: &str, name: &str) -> Option<BTreeMap<String, String>> {
        self.secret(namespace, name)
            .and_then(|secret| secret.string_data)
    }

    pub fn operations(&self) -> Vec<String> {
        self.state().operations.clone()
    }
}

#[async_trait]
impl K8sClient for MockK8sClient {
    async fn get_monitoring_config(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<MonitoringConfig, K8sError> {
        let mut state = self.state();
        state.enter(
            K8sOperation::GetMonitoringConfig,
            MONITORING_CONFIG,
            namespace,
            name,
        )?;

        state
            .config_index(namespace, name)
            .map(|index| state.configs[index].clone())
            .ok_or_else(|| not_found(MONITORING_CONFIG, namespace, name))
    }

    async fn list_monitoring_configs(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<MonitoringConfig>, K8sError> {
        let mut state = self.state();
        state.enter(
            K8sOperation::ListMonitoringConfigs,
            MONITORING_CONFIG,
            namespace.unwrap_or("*"),
            "*",
        )?;

        Ok(state
            .configs
            .iter()
            .filter(|config| namespace.is_none() || config.namespace().as_deref() == namespace)
            .cloned()
            .collect())
    }

    async fn create_monitoring_config(
        &self,
        config: &MonitoringConfig,
    ) -> Result<MonitoringConfig, K8sError> {
        let namespace = config.namespace().unwrap_or_default();
        let name = config.name_any();
        let mut state = self.state();
        state.enter(
            K8sOperation::CreateMonitoringConfig,
            MONITORING_CONFIG,
            &namespace,
            &name,
        )?;

        if state.config_index(&namespace, &name).is_some() {
            return Err(K8sError::AlreadyExists {
                kind: MONITORING_CONFIG,
                namespace,
                name,
            });
        }
        state.configs.push(config.clone());

        Ok(config.clone())
    }

    async fn update_monitoring_config(
        &self,
        config: &MonitoringConfig,
    ) -> Result<MonitoringConfig, K8sError> {
        let namespace = config.namespace().unwrap_or_default();
        let name = config.name_any();
        let mut state = self.state();
        state.enter(
            K8sOperation::UpdateMonitoringConfig,
            MONITORING_CONFIG,
            &namespace,
            &name,
        )?;

        let index = state
            .config_index(&namespace, &name)
            .ok_or_else(|| not_found(MONITORING_CONFIG, &namespace, &name))?;
        state.configs[index] = config.clone();

        Ok(config.clone())
    }

    async fn delete_monitoring_config(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), K8sError> {
        let mut state = self.state();
        state.enter(
            K8sOperation::DeleteMonitoringConfig,
            MONITORING_CONFIG,
            namespace,
            name,
        )?;

        let index = state
            .config_index(namespace, name)
            .ok_or_else(|| not_found(MONITORING_CONFIG, namespace, name))?;
        state.configs.remove(index);

        Ok(())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, K8sError> {
        let mut state = self.state();
        state.enter(K8sOperation::GetSecret, SECRET, namespace, name)?;

        state
            .secrets
            .get(&coordinate(namespace, name))
            .cloned()
            .ok_or_else(|| not_found(SECRET, namespace, name))
    }

    async fn create_secret(&self, secret: &Secret) -> Result<(), K8sError> {
        let key = coordinate(&secret.namespace().unwrap_or_default(), &secret.name_any());
        let mut state = self.state();
        state.enter(K8sOperation::CreateSecret, SECRET, &key.0, &key.1)?;

        if state.secrets.contains_key(&key) {
            return Err(K8sError::AlreadyExists {
                kind: SECRET,
                namespace: key.0,
                name: key.1,
            });
        }
        state.secrets.insert(key, secret.clone());

        Ok(())
    }

    async fn update_secret(&self, secret: &Secret) -> Result<(), K8sError> {
        let key = coordinate(&secret.namespace().unwrap_or_default(), &secret.name_any());
        let mut state = self.state();
        state.enter(K8sOperation::UpdateSecret, SECRET, &key.0, &key.1)?;

        match state.secrets.get_mut(&key) {
            Some(stored) => {
                *stored = secret.clone();
                Ok(())
            }
            None => Err(not_found(SECRET, &key.0, &key.1)),
        }
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), K8sError> {
        let mut state = self.state();
        state.enter(K8sOperation::DeleteSecret, SECRET, namespace, name)?;

        state
            .secrets
            .remove(&coordinate(namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found(SECRET, namespace, name))
    }

    async fn is_monitoring_config_used(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<bool, K8sError> {
        let mut state = self.state();
        state.enter(
            K8sOperation::IsMonitoringConfigUsed,
            MONITORING_CONFIG,
            namespace,
            name,
        )?;

        if state.config_index(namespace, name).is_none() {
            return Err(not_found(MONITORING_CONFIG, namespace, name));
        }

        Ok(state.used.contains(&coordinate(namespace, name)))
    }
}

/// A call received by [`MockApiKeyIssuer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedKeyRequest {
    pub url: String,
    pub label: String,
    pub user: String,
    pub password: String,
    pub skip_tls_verify: bool,
}

#[derive(Default)]
struct IssuerState {
    keys: Vec<String>,
    failing: bool,
    requests: Vec<IssuedKeyRequest>,
}

/// API key issuer handing out scripted keys, `K1`, `K2`, ... when none are scripted.
#[derive(Default)]
pub struct MockApiKeyIssuer {
    state: Mutex<IssuerState>,
}

impl MockApiKeyIssuer {
    fn state(&self) -> MutexGuard<'_, IssuerState> {
        self.state.lock().expect("mock issuer state poisoned")
    }

    /// Queues `key` as the next key handed out.
    pub fn push_key(&self, key: &str) {
        self.state().keys.push(key.to_string());
    }

    pub fn set_failing(&self, failing: bool) {
        self.state().failing = failing;
    }

    pub fn requests(&self) -> Vec<IssuedKeyRequest> {
        self.state().requests.clone()
    }
}

#[async_trait]
impl ApiKeyIssuer for MockApiKeyIssuer {
    async fn create_api_key(
        &self,
        url: &str,
        label: &str,
        login: PmmLogin<'_>,
        skip_tls_verify: bool,
    ) -> Result<SecretString, PmmError> {
        let mut state = self.state();
        state.requests.push(IssuedKeyRequest {
            url: url.to_string(),
            label: label.to_string(),
            user: login.user.to_string(),
            password: login.password.expose_secret().to_string(),
            skip_tls_verify,
        });

        if state.failing {
            return Err(PmmError::UnexpectedStatus {
                status: 401,
                body: "invalid username or password".to_string(),
            });
        }

        let key = if state.keys.is_empty() {
            format!("K{}", state.requests.len())
        } else {
            state.keys.remove(0)
        };

        Ok(SecretString::from(key))
    }
}

#[derive(Default)]
struct AuthorizerState {
    denied: HashSet<(String, Action, String)>,
    denied_users: HashSet<String>,
    broken: bool,
}

/// Authorizer allowing everything except explicitly denied requests.
#[derive(Default)]
pub struct MockAuthorizer {
    state: Mutex<AuthorizerState>,
}

impl MockAuthorizer {
    fn state(&self) -> MutexGuard<'_, AuthorizerState> {
        self.state.lock().expect("mock authorizer state poisoned")
    }

    /// Denies `action` on the object `namespace/name` to `user`.
    pub fn deny(&self, user: &str, action: Action, namespace: &str, name: &str) {
        self.state().denied.insert((
            user.to_string(),
            action,
            format!("{namespace}/{name}"),
        ));
    }

    /// Denies every request of `user`.
    pub fn deny_user(&self, user: &str) {
        self.state().denied_users.insert(user.to_string());
    }

    /// Makes every call fail without a decision.
    pub fn set_broken(&self, broken: bool) {
        self.state().broken = broken;
    }
}

#[async_trait]
impl Authorizer for MockAuthorizer {
    async fn enforce(
        &self,
        user: &str,
        resource: &str,
        action: Action,
        object: &str,
    ) -> Result<(), AuthorizationError> {
        let state = self.state();
        if state.broken {
            return Err(AuthorizationError::Policy(
                "policy store unavailable".to_string(),
            ));
        }

        let denied = state.denied_users.contains(user)
            || state
                .denied
                .contains(&(user.to_string(), action, object.to_string()));
        if denied {
            return Err(AuthorizationError::InsufficientPermissions {
                user: user.to_string(),
                resource: resource.to_string(),
                action,
                object: object.to_string(),
            });
        }

        Ok(())
    }
}

/// Builds a stored monitoring config as the API would have created it.
pub fn monitoring_config(namespace: &str, name: &str, url: &str) -> MonitoringConfig {
    MonitoringConfig::namespaced(
        namespace,
        name,
        MonitoringConfigSpec {
            monitoring_type: MonitoringType::Pmm,
            pmm: PmmConfig {
                url: url.to_string(),
                image: String::new(),
            },
            credentials_secret_name: name.to_string(),
            allowed_namespaces: vec![],
            verify_tls: Some(true),
        },
    )
}

/// A secret at `namespace/name` that no monitoring instance wrote.
pub fn unrelated_secret(namespace: &str, name: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        string_data: Some(BTreeMap::from([("password".to_string(), "x".to_string())])),
        ..Secret::default()
    }
}

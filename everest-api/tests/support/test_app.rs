#![allow(dead_code)]

use std::io;
use std::net::TcpListener;
use std::sync::Arc;

use base64::{Engine, prelude::BASE64_STANDARD};

use everest_api::config::ApiConfig;
use everest_api::k8s::K8sClient;
use everest_api::monitoring::{CreateMonitoringInstanceRequest, UpdateMonitoringInstanceRequest};
use everest_api::pmm::ApiKeyIssuer;
use everest_api::rbac::Authorizer;
use everest_api::startup::run;
use everest_config::{Environment, load_config};
use rand::random_range;
use reqwest::{IntoUrl, RequestBuilder};
use secrecy::ExposeSecret;

use crate::support::mocks::{MockApiKeyIssuer, MockAuthorizer, MockK8sClient};

pub struct TestApp {
    pub address: String,
    pub api_client: reqwest::Client,
    /// Name of the configured user the requests authenticate as.
    pub user: String,
    pub api_key: String,
    pub k8s: Arc<MockK8sClient>,
    pub issuer: Arc<MockApiKeyIssuer>,
    pub authorizer: Arc<MockAuthorizer>,
    config: ApiConfig,
    server_handle: tokio::task::JoinHandle<io::Result<()>>,
}

impl TestApp {
    fn get_authenticated<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.api_client.get(url).bearer_auth(self.api_key.clone())
    }

    fn post_authenticated<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.api_client.post(url).bearer_auth(self.api_key.clone())
    }

    fn patch_authenticated<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.api_client.patch(url).bearer_auth(self.api_key.clone())
    }

    fn delete_authenticated<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.api_client
            .delete(url)
            .bearer_auth(self.api_key.clone())
    }

    fn instances_url(&self, namespace: &str) -> String {
        format!(
            "{}/v1/namespaces/{namespace}/monitoring-instances",
            &self.address
        )
    }

    fn instance_url(&self, namespace: &str, name: &str) -> String {
        format!("{}/{name}", self.instances_url(namespace))
    }

    /// Switches the requests to the configured user `name`.
    pub fn authenticate_as(&mut self, name: &str) {
        let user = self
            .config
            .users
            .iter()
            .find(|user| user.name == name)
            .expect("user is not configured");
        self.user = user.name.clone();
        self.api_key = user.api_key.expose_secret().to_string();
    }

    pub async fn create_monitoring_instance(
        &self,
        namespace: &str,
        instance: &CreateMonitoringInstanceRequest,
    ) -> reqwest::Response {
        self.post_authenticated(self.instances_url(namespace))
            .json(instance)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Posts a raw JSON body, which may not decode into a create request.
    pub async fn create_monitoring_instance_raw(
        &self,
        namespace: &str,
        body: &serde_json::Value,
    ) -> reqwest::Response {
        self.post_authenticated(self.instances_url(namespace))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn list_monitoring_instances(&self, namespace: &str) -> reqwest::Response {
        self.get_authenticated(self.instances_url(namespace))
            .send()
            .await
            .expect("failed to execute request")
    }

    pub async fn list_all_monitoring_instances(&self) -> reqwest::Response {
        self.get_authenticated(format!("{}/v1/monitoring-instances", &self.address))
            .send()
            .await
            .expect("failed to execute request")
    }

    pub async fn read_monitoring_instance(&self, namespace: &str, name: &str) -> reqwest::Response {
        self.get_authenticated(self.instance_url(namespace, name))
            .send()
            .await
            .expect("failed to execute request")
    }

    pub async fn update_monitoring_instance(
        &self,
        namespace: &str,
        name: &str,
        update: &UpdateMonitoringInstanceRequest,
    ) -> reqwest::Response {
        self.patch_authenticated(self.instance_url(namespace, name))
            .json(update)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn delete_monitoring_instance(&self, namespace: &str, name: &str) -> reqwest::Response {
        self.delete_authenticated(self.instance_url(namespace, name))
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

/// The configured keys are placeholders, so every test app gets fresh ones.
fn generate_api_key() -> String {
    BASE64_STANDARD.encode(rand::random::<[u8; 32]>())
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.server_handle.abort();
    }
}

pub async fn spawn_test_app() -> TestApp {
    // We set the environment to dev.
    Environment::Dev.set();

    let base_address = "127.0.0.1";
    let listener =
        TcpListener::bind(format!("{base_address}:0")).expect("failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let mut config = load_config::<ApiConfig>().expect("Failed to read configuration");
    for user in &mut config.users {
        user.api_key = generate_api_key().into();
    }

    // Any configured user works, the mock authorizer allows everyone by default.
    let user_index = random_range(0..config.users.len());
    let user = config.users[user_index].name.clone();
    let api_key = config.users[user_index].api_key.expose_secret().to_string();

    let k8s = Arc::new(MockK8sClient::default());
    let issuer = Arc::new(MockApiKeyIssuer::default());
    let authorizer = Arc::new(MockAuthorizer::default());

    let server = run(
        config.clone(),
        listener,
        k8s.clone() as Arc<dyn K8sClient>,
        issuer.clone() as Arc<dyn ApiKeyIssuer>,
        authorizer.clone() as Arc<dyn Authorizer>,
    )
    .await
    .expect("failed to bind address");

    let server_handle = tokio::spawn(server);

    TestApp {
        address: format!("http://{base_address}:{port}"),
        api_client: reqwest::Client::new(),
        user,
        api_key,
        k8s,
        issuer,
        authorizer,
        config,
        server_handle,
    }
}

//! Client for the PMM server API keys endpoint.
//!
//! The manager depends on [`ApiKeyIssuer`] only. [`HttpPmmClient`] mints keys over
//! HTTP and tests replace it with a scripted issuer.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Path of the PMM endpoint creating API keys, relative to the server URL.
const API_KEYS_PATH: &str = "graph/api/auth/keys";

/// Role requested for every key minted by the API.
const API_KEY_ROLE: &str = "Admin";

#[derive(Debug, Error)]
pub enum PmmError {
    #[error("the PMM url {url} is invalid: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("the PMM server answered with status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("the PMM request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Login used to mint an API key.
#[derive(Debug)]
pub struct PmmLogin<'a> {
    pub user: &'a str,
    pub password: &'a SecretString,
}

/// Mints API keys on a PMM server.
#[async_trait]
pub trait ApiKeyIssuer: Send + Sync {
    /// Creates an API key named `label` on the PMM server at `url`.
    ///
    /// Certificate verification of the server is skipped when `skip_tls_verify` is
    /// `true`.
    async fn create_api_key(
        &self,
        url: &str,
        label: &str,
        login: PmmLogin<'_>,
        skip_tls_verify: bool,
    ) -> Result<SecretString, PmmError>;
}

#[derive(Serialize)]
struct CreateApiKeyRequest<'a> {
    name: &'a str,
    role: &'a str,
}

#[derive(Deserialize)]
struct CreateApiKeyResponse {
    key: String,
}

/// [`ApiKeyIssuer`] talking to PMM over HTTP with basic authentication.
#[derive(Debug, Clone)]
pub struct HttpPmmClient {
    verifying: reqwest::Client,
    insecure: reqwest::Client,
}

impl HttpPmmClient {
    /// Builds a client whose requests are aborted after `request_timeout`.
    pub fn new(request_timeout: Duration) -> Result<HttpPmmClient, PmmError> {
        let verifying = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        let insecure = reqwest::Client::builder()
            .timeout(request_timeout)
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(HttpPmmClient {
            verifying,
            insecure,
        })
    }
}

/// Returns the API keys endpoint of the PMM server at `url`.
fn api_keys_endpoint(url: &str) -> Result<Url, PmmError> {
    let endpoint = format!("{}/{API_KEYS_PATH}", url.trim_end_matches('/'));

    Url::parse(&endpoint).map_err(|source| PmmError::InvalidUrl {
        url: url.to_string(),
        source,
    })
}

#[async_trait]
impl ApiKeyIssuer for HttpPmmClient {
    async fn create_api_key(
        &self,
        url: &str,
        label: &str,
        login: PmmLogin<'_>,
        skip_tls_verify: bool,
    ) -> Result<SecretString, PmmError> {
        let endpoint = api_keys_endpoint(url)?;
        let client = if skip_tls_verify {
            &self.insecure
        } else {
            &self.verifying
        };

        debug!(%endpoint, label, skip_tls_verify, "creating pmm api key");

        let response = client
            .post(endpoint)
            .basic_auth(login.user, Some(login.password.expose_secret()))
            .json(&CreateApiKeyRequest {
                name: label,
                role: API_KEY_ROLE,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PmmError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let response: CreateApiKeyResponse = response.json().await?;

        Ok(response.key.into())
    }
}

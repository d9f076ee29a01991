use std::fmt;
use std::time::Duration;

use base64::{Engine, prelude::BASE64_STANDARD};
use everest_config::{Config, SerializableSecretString};
use serde::Deserialize;
use thiserror::Error;

use crate::monitoring::policy::AuthorizationPolicy;
use crate::rbac::Grant;

/// Required length in bytes for a valid API key.
const API_KEY_LENGTH_IN_BYTES: usize = 32;

/// Complete configuration of the Everest API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Application server settings.
    pub application: ApplicationSettings,
    /// Users allowed to call the API, each identified by its own API key.
    pub users: Vec<UserConfig>,
    /// Settings of the PMM client minting API keys.
    #[serde(default)]
    pub pmm: PmmSettings,
    /// Per-operation object policy and the grants evaluated by the authorizer.
    #[serde(default)]
    pub authorization: AuthorizationConfig,
}

impl Config for ApiConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

/// HTTP server configuration settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    /// Host address the API listens on.
    pub host: String,
    /// Port number the API listens on.
    pub port: u16,
}

impl fmt::Display for ApplicationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "    host: {}", self.host)?;
        writeln!(f, "    port: {}", self.port)
    }
}

/// A user of the API.
#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    /// Name checked against the authorization grants.
    pub name: String,
    /// Base64-encoded 32 byte bearer key.
    pub api_key: SerializableSecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PmmSettings {
    /// Timeout in seconds of a single request to a PMM server.
    pub request_timeout_secs: u64,
}

impl PmmSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for PmmSettings {
    fn default() -> Self {
        PmmSettings {
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationConfig {
    #[serde(default)]
    pub policy: AuthorizationPolicy,
    #[serde(default)]
    pub grants: Vec<Grant>,
}

/// Errors that can occur during API key validation and conversion.
#[derive(Debug, Error)]
pub enum ApiKeyConversionError {
    /// The API key is not valid base64.
    #[error("api key is not base64 encoded")]
    NotBase64Encoded,

    /// The API key does not have the expected length of 32 bytes.
    #[error("expected length of api key is 32, but actual length is {0}")]
    LengthNot32Bytes(usize),
}

/// Validated API key as a 32-byte array.
#[derive(Debug, Clone)]
pub struct ApiKey {
    /// The 32-byte decoded API key.
    pub key: [u8; API_KEY_LENGTH_IN_BYTES],
}

impl TryFrom<&str> for ApiKey {
    type Error = ApiKeyConversionError;

    /// Creates an [`ApiKey`] from a base64-encoded string decoding to exactly 32 bytes.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let key = BASE64_STANDARD
            .decode(value)
            .map_err(|_| ApiKeyConversionError::NotBase64Encoded)?;

        let key: [u8; API_KEY_LENGTH_IN_BYTES] = key
            .try_into()
            .map_err(|key: Vec<u8>| ApiKeyConversionError::LengthNot32Bytes(key.len()))?;

        Ok(ApiKey { key })
    }
}

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::monitoring::{
    CreateMonitoringInstanceRequest, PmmCredentials, UpdateMonitoringInstanceRequest,
};

/// Maximum length of a DNS-1123 label.
const MAX_LABEL_LENGTH: usize = 63;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid monitoring instance name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("invalid namespace {namespace:?}: {reason}")]
    InvalidNamespace {
        namespace: String,
        reason: &'static str,
    },

    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("pmm credentials must contain either an apiKey or both a user and a password")]
    MissingCredentials,
}

/// Way of obtaining the API key stored in the credentials secret.
#[derive(Debug)]
pub enum Credentials {
    /// Store the key as given.
    ApiKey(SecretString),
    /// Mint a key on the PMM server with this login.
    Login { user: String, password: SecretString },
}

/// Checks that `value` is a DNS-1123 label.
fn check_dns_label(value: &str) -> Result<(), &'static str> {
    if value.is_empty() {
        return Err("must not be empty");
    }
    if value.len() > MAX_LABEL_LENGTH {
        return Err("must be no more than 63 characters");
    }
    if !value
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err("must consist of lower case alphanumeric characters or '-'");
    }
    if value.starts_with('-') || value.ends_with('-') {
        return Err("must start and end with an alphanumeric character");
    }

    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    check_dns_label(name).map_err(|reason| ValidationError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

pub fn validate_namespace(namespace: &str) -> Result<(), ValidationError> {
    check_dns_label(namespace).map_err(|reason| ValidationError::InvalidNamespace {
        namespace: namespace.to_string(),
        reason,
    })
}

fn validate_namespaces(namespaces: &[String]) -> Result<(), ValidationError> {
    namespaces
        .iter()
        .try_for_each(|namespace| validate_namespace(namespace))
}

/// Checks that `url` is an absolute `http` or `https` URL.
pub fn validate_url(url: &str) -> Result<(), ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidUrl {
        url: url.to_string(),
        reason,
    };

    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(invalid(format!("unsupported scheme {scheme}"))),
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    Ok(())
}

impl PmmCredentials {
    /// Resolves the credentials, preferring a non-empty API key over a login.
    pub fn resolve(&self) -> Result<Credentials, ValidationError> {
        if let Some(api_key) = self.api_key.as_ref().filter(|key| !key.is_empty()) {
            return Ok(Credentials::ApiKey((**api_key).clone()));
        }

        match (&self.user, &self.password) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                Ok(Credentials::Login {
                    user: user.clone(),
                    password: (**password).clone(),
                })
            }
            _ => Err(ValidationError::MissingCredentials),
        }
    }
}

impl CreateMonitoringInstanceRequest {
    /// Validates the request and returns how the API key is to be obtained.
    pub fn validate(&self) -> Result<Credentials, ValidationError> {
        validate_name(&self.name)?;
        validate_url(&self.url)?;
        validate_namespaces(&self.allowed_namespaces)?;

        self.pmm
            .as_ref()
            .ok_or(ValidationError::MissingCredentials)?
            .resolve()
    }
}

impl UpdateMonitoringInstanceRequest {
    /// Validates the present fields and returns the new credentials, if any.
    pub fn validate(&self) -> Result<Option<Credentials>, ValidationError> {
        if let Some(url) = &self.url {
            validate_url(url)?;
        }
        if let Some(allowed_namespaces) = &self.allowed_namespaces {
            validate_namespaces(allowed_namespaces)?;
        }

        self.pmm.as_ref().map(PmmCredentials::resolve).transpose()
    }
}

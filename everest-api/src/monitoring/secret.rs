use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use secrecy::{ExposeSecret, SecretString};

/// Secret key holding the PMM API key.
pub const API_KEY_FIELD: &str = "apiKey";

/// Secret key holding the authentication mode.
pub const USERNAME_FIELD: &str = "username";

/// Value of [`USERNAME_FIELD`] telling consumers to authenticate with the API key.
pub const API_KEY_USERNAME: &str = "api_key";

const OPAQUE_SECRET_TYPE: &str = "Opaque";

/// Label naming the component that writes credentials secrets.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Value of [`MANAGED_BY_LABEL`] on secrets written by this service.
pub const MANAGED_BY: &str = "everest-api";

/// Label naming the monitoring config a credentials secret belongs to.
pub const MONITORING_CONFIG_LABEL: &str = "everest.percona.com/monitoring-config";

/// Returns the string data stored in a credentials secret.
pub fn secret_data(api_key: &SecretString) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            API_KEY_FIELD.to_string(),
            api_key.expose_secret().to_string(),
        ),
        (USERNAME_FIELD.to_string(), API_KEY_USERNAME.to_string()),
    ])
}

/// Builds the credentials secret of the monitoring instance at `namespace/name`.
pub fn build_credentials_secret(namespace: &str, name: &str, api_key: &SecretString) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([
                (MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string()),
                (MONITORING_CONFIG_LABEL.to_string(), name.to_string()),
            ])),
            ..ObjectMeta::default()
        },
        type_: Some(OPAQUE_SECRET_TYPE.to_string()),
        string_data: Some(secret_data(api_key)),
        ..Secret::default()
    }
}

/// Returns `true` when `secret` was written by this service as the credentials of
/// the monitoring config `name`. Secrets seeded by anyone else never match.
pub fn is_credentials_secret_of(secret: &Secret, name: &str) -> bool {
    let Some(labels) = secret.metadata.labels.as_ref() else {
        return false;
    };

    labels.get(MANAGED_BY_LABEL).map(String::as_str) == Some(MANAGED_BY)
        && labels.get(MONITORING_CONFIG_LABEL).map(String::as_str) == Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_carries_key_and_sentinel_username() {
        let secret = build_credentials_secret("team-a", "pmm1", &"K1".into());

        assert_eq!(secret.metadata.name.as_deref(), Some("pmm1"));
        assert_eq!(secret.metadata.namespace.as_deref(), Some("team-a"));
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));

        let data = secret.string_data.unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data["apiKey"], "K1");
        assert_eq!(data["username"], "api_key");
    }

    #[test]
    fn only_labelled_secrets_belong_to_an_instance() {
        let ours = build_credentials_secret("team-a", "pmm1", &"K1".into());
        assert!(is_credentials_secret_of(&ours, "pmm1"));
        assert!(!is_credentials_secret_of(&ours, "pmm2"));

        let unrelated = Secret {
            metadata: ObjectMeta {
                name: Some("pmm1".to_string()),
                namespace: Some("team-a".to_string()),
                ..ObjectMeta::default()
            },
            ..Secret::default()
        };
        assert!(!is_credentials_secret_of(&unrelated, "pmm1"));

        let mut foreign = ours.clone();
        foreign
            .metadata
            .labels
            .as_mut()
            .unwrap()
            .insert(MANAGED_BY_LABEL.to_string(), "helm".to_string());
        assert!(!is_credentials_secret_of(&foreign, "pmm1"));
    }
}

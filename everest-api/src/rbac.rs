//! Per-object authorization of monitoring instance operations.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Resource kind checked for every monitoring instance operation.
pub const RESOURCE_MONITORING_INSTANCES: &str = "monitoring-instances";

/// Pattern matching any subject, resource, action or object in a [`Grant`].
const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the object coordinate `namespace/name` checked by the authorizer.
pub fn object_name(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

#[derive(Debug, Error)]
pub enum AuthorizationError {
    /// The policy denies the request.
    #[error("user {user} has insufficient permissions to {action} {resource} {object}")]
    InsufficientPermissions {
        user: String,
        resource: String,
        action: Action,
        object: String,
    },

    /// The policy could not be evaluated.
    #[error("the authorization policy could not be evaluated: {0}")]
    Policy(String),
}

impl AuthorizationError {
    pub fn is_insufficient_permissions(&self) -> bool {
        matches!(self, AuthorizationError::InsufficientPermissions { .. })
    }
}

/// Decides whether `user` may run `action` on `object` of kind `resource`.
///
/// A deny is reported as [`AuthorizationError::InsufficientPermissions`]; every other
/// error means no decision could be made.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn enforce(
        &self,
        user: &str,
        resource: &str,
        action: Action,
        object: &str,
    ) -> Result<(), AuthorizationError>;
}

/// A single allow rule. Every field is either an exact value or `*`; `object` may
/// also be `namespace/*` to cover every object of a namespace.
#[derive(Debug, Clone, Deserialize)]
pub struct Grant {
    pub subject: String,
    pub resource: String,
    pub action: String,
    pub object: String,
}

impl Grant {
    fn allows(&self, user: &str, resource: &str, action: Action, object: &str) -> bool {
        matches_exact(&self.subject, user)
            && matches_exact(&self.resource, resource)
            && matches_exact(&self.action, action.as_str())
            && matches_object(&self.object, object)
    }
}

fn matches_exact(pattern: &str, value: &str) -> bool {
    pattern == WILDCARD || pattern == value
}

fn matches_object(pattern: &str, object: &str) -> bool {
    if matches_exact(pattern, object) {
        return true;
    }

    match (pattern.strip_suffix("/*"), object.split_once('/')) {
        (Some(pattern_namespace), Some((namespace, _))) => pattern_namespace == namespace,
        _ => false,
    }
}

/// [`Authorizer`] allowing a request when at least one configured [`Grant`] matches.
#[derive(Debug, Clone, Default)]
pub struct GrantAuthorizer {
    grants: Vec<Grant>,
}

impl GrantAuthorizer {
    pub fn new(grants: Vec<Grant>) -> GrantAuthorizer {
        GrantAuthorizer { grants }
    }
}

#[async_trait]
impl Authorizer for GrantAuthorizer {
    async fn enforce(
        &self,
        user: &str,
        resource: &str,
        action: Action,
        object: &str,
    ) -> Result<(), AuthorizationError> {
        if self
            .grants
            .iter()
            .any(|grant| grant.allows(user, resource, action, object))
        {
            return Ok(());
        }

        Err(AuthorizationError::InsufficientPermissions {
            user: user.to_string(),
            resource: resource.to_string(),
            action,
            object: object.to_string(),
        })
    }
}

use serde::Deserialize;

/// How an operation checks the objects it touches against the authorizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectPolicy {
    /// No per-object check.
    Unchecked,
    /// A deny fails the whole operation.
    Enforce,
    /// Denied objects are silently left out. Only meaningful for list; single
    /// object operations treat it as [`ObjectPolicy::Enforce`].
    Filter,
}

/// Object policy of every monitoring instance operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthorizationPolicy {
    pub create: ObjectPolicy,
    pub list: ObjectPolicy,
    pub get: ObjectPolicy,
    pub update: ObjectPolicy,
    pub delete: ObjectPolicy,
}

impl Default for AuthorizationPolicy {
    fn default() -> Self {
        AuthorizationPolicy {
            create: ObjectPolicy::Enforce,
            list: ObjectPolicy::Filter,
            get: ObjectPolicy::Enforce,
            update: ObjectPolicy::Enforce,
            delete: ObjectPolicy::Enforce,
        }
    }
}

use std::fmt;

use ahash::HashSet;
use serde_json::Value;

use crate::resolution::Resolution;

/// The rule name used when neither the field nor the operation overrides it.
pub const DEFAULT_RULE: &str = "default";

/// Caller capability an operation requires (the `permit` option).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Role(String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Symbolic name selecting which predicate the policy applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rule(String);

impl Rule {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Rule {
    fn default() -> Self {
        Self::new(DEFAULT_RULE)
    }
}

impl From<&str> for Rule {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capabilities the middleware needs from the caller-supplied policy.
///
/// The middleware never calls anything else on a policy, so a test double
/// only has to answer these four questions.
pub trait AuthorizationPolicy: Send + Sync {
    /// Per-request caller context, whatever the host engine carries around.
    type Context;

    /// Roles whose operations may omit the `scope` option.
    fn not_scoped_roles(&self) -> HashSet<Role>;

    fn default_rule(&self) -> Rule;

    /// Whether the caller in `context` may see private data of `source` under `rule`.
    fn context_user_authorized(&self, context: &Self::Context, source: &Value, rule: &Rule)
        -> bool;

    /// Error message attached to a field the caller was denied.
    fn unauthorized_field_message(&self, resolution: &Resolution<Self::Context>, field: &str)
        -> String;
}

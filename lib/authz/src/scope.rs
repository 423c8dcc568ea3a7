use std::sync::Arc;

use crate::declaration::{DeclValue, SOURCE_SCOPE};
use crate::error::ConfigError;
use crate::policy::{AuthorizationPolicy, Role};
use crate::schema::ObjectDefinition;

/// What a `scope` declaration asks for.
#[derive(Debug, Clone)]
pub enum ScopeKind {
    /// No scope declared, the role is not scoped.
    Default,
    /// `false`, no scope check.
    Disabled,
    /// `"$source"`, the resolution source is the scope.
    Source,
    Entity(Arc<ObjectDefinition>),
}

/// Classifies a scope declaration. Returns `None` for shapes that are never valid.
pub fn scope_kind(scope: &DeclValue) -> Option<ScopeKind> {
    match scope {
        DeclValue::Null => Some(ScopeKind::Default),
        DeclValue::Bool(false) => Some(ScopeKind::Disabled),
        DeclValue::Str(sentinel) if sentinel == SOURCE_SCOPE => Some(ScopeKind::Source),
        DeclValue::Entity(object) => Some(ScopeKind::Entity(object.clone())),
        _ => None,
    }
}

/// Checks a `scope` declaration against the operation's permit role.
pub fn validate_scope<P>(scope: &DeclValue, permit: &Role, policy: &P) -> Result<(), ConfigError>
where
    P: AuthorizationPolicy + ?Sized,
{
    match scope_kind(scope) {
        Some(ScopeKind::Default) => {
            if policy.not_scoped_roles().contains(permit) {
                Ok(())
            } else {
                Err(ConfigError::MissingScope {
                    role: permit.to_string(),
                })
            }
        }
        Some(ScopeKind::Disabled) | Some(ScopeKind::Source) => Ok(()),
        Some(ScopeKind::Entity(object)) => {
            if object.source.is_some() {
                Ok(())
            } else {
                Err(ConfigError::InvalidScopedEntity(object.name.clone()))
            }
        }
        None => match scope {
            // A name that was never bound to a declared type.
            DeclValue::Str(name) => Err(ConfigError::InvalidScopedEntity(name.clone())),
            other => Err(ConfigError::InvalidScope(other.to_string())),
        },
    }
}

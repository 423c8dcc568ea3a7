use tracing::trace;

use crate::declaration::{is_symbolic_name, DeclValue, OperationConfig};
use crate::error::{ConfigError, SchemaError};
use crate::policy::{AuthorizationPolicy, Role};
use crate::scope::validate_scope;

/// Validates one operation's authorization declaration.
///
/// Checks run in a fixed order (`permit`, `optional`, `rule`, `scope`, `args`)
/// and stop at the first malformed option.
pub fn validate<P>(
    config: &OperationConfig,
    policy: &P,
    operation_name: &str,
) -> Result<(), SchemaError>
where
    P: AuthorizationPolicy + ?Sized,
{
    validate_options(config, policy)
        .map_err(|source| SchemaError::invalid_config(operation_name, source))?;

    trace!(operation = operation_name, "authorization declaration is valid");

    Ok(())
}

fn validate_options<P>(config: &OperationConfig, policy: &P) -> Result<(), ConfigError>
where
    P: AuthorizationPolicy + ?Sized,
{
    let permit = validate_permit(&config.permit)?;
    validate_optional(&config.optional)?;
    validate_rule(&config.rule)?;
    validate_scope(&config.scope, &permit, policy)?;
    validate_args(&config.args)
}

fn validate_permit(permit: &DeclValue) -> Result<Role, ConfigError> {
    match permit {
        DeclValue::Null => Err(ConfigError::MissingPermit),
        other => other
            .as_symbol()
            .map(Role::new)
            .ok_or_else(|| ConfigError::InvalidPermit(other.to_string())),
    }
}

fn validate_optional(optional: &DeclValue) -> Result<(), ConfigError> {
    match optional {
        DeclValue::Null | DeclValue::Bool(_) => Ok(()),
        other => Err(ConfigError::InvalidOptional(other.to_string())),
    }
}

fn validate_rule(rule: &DeclValue) -> Result<(), ConfigError> {
    match rule {
        DeclValue::Null => Ok(()),
        other if other.as_symbol().is_some() => Ok(()),
        other => Err(ConfigError::InvalidRule(other.to_string())),
    }
}

fn validate_args(args: &DeclValue) -> Result<(), ConfigError> {
    match args {
        DeclValue::Null => Ok(()),
        single if single.as_symbol().is_some() => Ok(()),
        DeclValue::List(items) => {
            match items.iter().find(|item| item.as_symbol().is_none()) {
                Some(item) => Err(ConfigError::InvalidArgs(format!(
                    "list items must be argument names, got: {}",
                    item
                ))),
                None => Ok(()),
            }
        }
        DeclValue::Map(entries) => {
            for (key, value) in entries {
                if !is_symbolic_name(key) {
                    return Err(ConfigError::InvalidArgs(format!(
                        "mapping keys must be argument names, got: {:?}",
                        key
                    )));
                }
                validate_args_mapping_value(key, value)?;
            }
            Ok(())
        }
        other => Err(ConfigError::InvalidArgs(format!(
            "expected an argument name, a list of names or a mapping, got: {}",
            other
        ))),
    }
}

fn validate_args_mapping_value(key: &str, value: &DeclValue) -> Result<(), ConfigError> {
    match value {
        single if single.as_symbol().is_some() => Ok(()),
        DeclValue::List(items) => {
            let invalid = items
                .iter()
                .find(|item| !matches!(item, DeclValue::Predicate(_)) && item.as_symbol().is_none());

            match invalid {
                Some(item) => Err(ConfigError::InvalidArgs(format!(
                    "{:?} must list argument names or predicates, got: {}",
                    key, item
                ))),
                None => Ok(()),
            }
        }
        other => Err(ConfigError::InvalidArgs(format!(
            "{:?} must be an argument name or a list, got: {}",
            key, other
        ))),
    }
}

//! Build-time rewriting of a field's step list.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::SchemaError;
use crate::policy::AuthorizationPolicy;
use crate::schema::{ObjectDefinition, OperationField};
use crate::steps::MiddlewareStep;
use crate::validation::validate;

/// Gates an operation on its authorization declaration.
///
/// The first `QueryAuthorization` or `Resolution` step decides: a declaration
/// must be valid, a resolver reached first means nothing was declared. The
/// list itself is returned unchanged.
#[instrument(level = "debug", skip(steps, policy), fields(operation = %field.name))]
pub fn add_query_authorization<C, P>(
    steps: &[MiddlewareStep<C>],
    field: &OperationField,
    policy: &P,
) -> Result<Vec<MiddlewareStep<C>>, SchemaError>
where
    P: AuthorizationPolicy<Context = C> + ?Sized,
{
    if field.is_introspection() {
        return Ok(steps.to_vec());
    }

    let gate = steps.iter().find(|step| {
        matches!(
            step,
            MiddlewareStep::QueryAuthorization(_) | MiddlewareStep::Resolution(_)
        )
    });

    match gate {
        Some(MiddlewareStep::QueryAuthorization(config)) => {
            validate(config, policy, &field.name)?;
        }
        Some(_) => {
            return Err(SchemaError::MissingPermission {
                operation: field.name.clone(),
            });
        }
        None => {
            debug!("no resolver in step list, nothing to authorize");
        }
    }

    Ok(steps.to_vec())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectAuthorizationState {
    /// No marker emitted for this chain yet.
    Pending,
    Inserted,
}

/// Inserts one `ObjectAuthorization` marker ahead of the step it guards.
///
/// The marker goes right before the first `QueryAuthorization` or
/// `Resolution`, whichever comes first. A marker already present satisfies
/// the chain, and extra markers are dropped, so the pass is idempotent.
pub fn add_object_authorization<C>(steps: &[MiddlewareStep<C>]) -> Vec<MiddlewareStep<C>> {
    let mut state = ObjectAuthorizationState::Pending;
    let mut composed = Vec::with_capacity(steps.len() + 1);

    for step in steps {
        match (state, step) {
            (ObjectAuthorizationState::Pending, MiddlewareStep::ObjectAuthorization) => {
                state = ObjectAuthorizationState::Inserted;
                composed.push(MiddlewareStep::ObjectAuthorization);
            }
            (ObjectAuthorizationState::Inserted, MiddlewareStep::ObjectAuthorization) => {}
            (
                ObjectAuthorizationState::Pending,
                MiddlewareStep::QueryAuthorization(_) | MiddlewareStep::Resolution(_),
            ) => {
                state = ObjectAuthorizationState::Inserted;
                composed.push(MiddlewareStep::ObjectAuthorization);
                composed.push(step.clone());
            }
            (_, step) => composed.push(step.clone()),
        }
    }

    composed
}

/// Prepends field authorization for `field` of `object`.
///
/// Nothing is checked here, field rules are evaluated per request.
pub fn add_field_authorization<C>(
    steps: &[MiddlewareStep<C>],
    field: &str,
    object: &Arc<ObjectDefinition>,
) -> Vec<MiddlewareStep<C>> {
    let mut composed = Vec::with_capacity(steps.len() + 1);
    composed.push(MiddlewareStep::FieldAuthorization {
        object: object.clone(),
        field: field.to_string(),
    });
    composed.extend(steps.iter().cloned());
    composed
}

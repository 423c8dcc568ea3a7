use tracing::trace;

use crate::declaration::OperationConfig;
use crate::error::SchemaError;
use crate::field::FieldAuthorizer;
use crate::policy::AuthorizationPolicy;
use crate::resolution::{FieldResult, Resolution};
use crate::steps::MiddlewareStep;

pub enum HookFlow {
    Proceed,
    /// Set the field's result and skip every remaining step.
    EndWithResult(FieldResult),
}

/// Request-time handling of the query and object authorization steps.
///
/// Loading the scoped entity and checking the permit belong to the host, the
/// default implementations let resolution proceed.
pub trait AuthorizationHooks<C>: Send + Sync {
    #[inline]
    fn on_query_authorization(
        &self,
        _config: &OperationConfig,
        _resolution: &Resolution<C>,
    ) -> HookFlow {
        HookFlow::Proceed
    }

    #[inline]
    fn on_object_authorization(&self, _resolution: &Resolution<C>) -> HookFlow {
        HookFlow::Proceed
    }
}

pub struct PassThroughHooks;

impl<C> AuthorizationHooks<C> for PassThroughHooks {}

/// Runs a composed step list in order, stopping once a step set the result.
pub fn execute<P>(
    steps: &[MiddlewareStep<P::Context>],
    resolution: &mut Resolution<P::Context>,
    policy: &P,
    hooks: &dyn AuthorizationHooks<P::Context>,
) -> Result<(), SchemaError>
where
    P: AuthorizationPolicy + ?Sized,
{
    for step in steps {
        if resolution.is_resolved() {
            trace!("result already set, skipping remaining steps");
            break;
        }

        match step {
            MiddlewareStep::QueryAuthorization(config) => {
                apply(hooks.on_query_authorization(config, resolution), resolution)
            }
            MiddlewareStep::ObjectAuthorization => {
                apply(hooks.on_object_authorization(resolution), resolution)
            }
            MiddlewareStep::FieldAuthorization { object, field } => {
                FieldAuthorizer::call(resolution, object, field, policy)?
            }
            MiddlewareStep::Resolution(resolver) => {
                let result = resolver.resolve(resolution);
                resolution.put_result(result);
            }
            MiddlewareStep::Other(middleware) => middleware.call(resolution),
        }
    }

    Ok(())
}

fn apply<C>(flow: HookFlow, resolution: &mut Resolution<C>) {
    if let HookFlow::EndWithResult(result) = flow {
        resolution.put_result(result);
    }
}

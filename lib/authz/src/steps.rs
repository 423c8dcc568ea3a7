use std::{fmt, sync::Arc};

use crate::declaration::OperationConfig;
use crate::resolution::{FieldResult, Resolution};
use crate::schema::ObjectDefinition;

/// The business-logic resolver at the end of a step list.
pub trait Resolver<C>: Send + Sync {
    fn resolve(&self, resolution: &Resolution<C>) -> FieldResult;
}

impl<C, F> Resolver<C> for F
where
    F: Fn(&Resolution<C>) -> FieldResult + Send + Sync,
{
    fn resolve(&self, resolution: &Resolution<C>) -> FieldResult {
        self(resolution)
    }
}

/// Any other middleware the host put into a step list. Opaque to composition.
pub trait Middleware<C>: Send + Sync {
    fn name(&self) -> &str;

    fn call(&self, resolution: &mut Resolution<C>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
pub enum StepKind {
    QueryAuthorization,
    ObjectAuthorization,
    FieldAuthorization,
    Resolution,
    Other,
}

/// One entry of the ordered resolution pipeline of a field.
pub enum MiddlewareStep<C> {
    QueryAuthorization(Arc<OperationConfig>),
    /// Marker, no payload.
    ObjectAuthorization,
    FieldAuthorization {
        object: Arc<ObjectDefinition>,
        field: String,
    },
    Resolution(Arc<dyn Resolver<C>>),
    Other(Arc<dyn Middleware<C>>),
}

impl<C> MiddlewareStep<C> {
    pub fn query_authorization(config: OperationConfig) -> Self {
        MiddlewareStep::QueryAuthorization(Arc::new(config))
    }

    pub fn resolution<R>(resolver: R) -> Self
    where
        R: Resolver<C> + 'static,
    {
        MiddlewareStep::Resolution(Arc::new(resolver))
    }

    pub fn other<M>(middleware: M) -> Self
    where
        M: Middleware<C> + 'static,
    {
        MiddlewareStep::Other(Arc::new(middleware))
    }

    pub fn kind(&self) -> StepKind {
        match self {
            MiddlewareStep::QueryAuthorization(_) => StepKind::QueryAuthorization,
            MiddlewareStep::ObjectAuthorization => StepKind::ObjectAuthorization,
            MiddlewareStep::FieldAuthorization { .. } => StepKind::FieldAuthorization,
            MiddlewareStep::Resolution(_) => StepKind::Resolution,
            MiddlewareStep::Other(_) => StepKind::Other,
        }
    }
}

// Manual impl: a derive would demand `C: Clone`.
impl<C> Clone for MiddlewareStep<C> {
    fn clone(&self) -> Self {
        match self {
            MiddlewareStep::QueryAuthorization(config) => {
                MiddlewareStep::QueryAuthorization(config.clone())
            }
            MiddlewareStep::ObjectAuthorization => MiddlewareStep::ObjectAuthorization,
            MiddlewareStep::FieldAuthorization { object, field } => {
                MiddlewareStep::FieldAuthorization {
                    object: object.clone(),
                    field: field.clone(),
                }
            }
            MiddlewareStep::Resolution(resolver) => MiddlewareStep::Resolution(resolver.clone()),
            MiddlewareStep::Other(middleware) => MiddlewareStep::Other(middleware.clone()),
        }
    }
}

impl<C> fmt::Display for MiddlewareStep<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiddlewareStep::QueryAuthorization(config) => {
                write!(f, "QueryAuthorization({})", config.permit)
            }
            MiddlewareStep::FieldAuthorization { object, field } => {
                write!(f, "FieldAuthorization({}.{})", object.name, field)
            }
            MiddlewareStep::Other(middleware) => write!(f, "Other({})", middleware.name()),
            step => write!(f, "{}", step.kind()),
        }
    }
}

impl<C> fmt::Debug for MiddlewareStep<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Renders a step list as `A -> B -> C`.
pub fn describe_steps<C>(steps: &[MiddlewareStep<C>]) -> String {
    steps
        .iter()
        .map(|step| step.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

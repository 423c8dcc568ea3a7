//! Authorization middleware for GraphQL resolution pipelines
//!
//! Authorization is enforced at three granularities:
//! 1. **Query** - every exposed query/mutation declares a permission, validated at schema build
//! 2. **Object** - a marker step guarding the object an operation resolves
//! 3. **Field** - per-field visibility evaluated against the parent value at request time

pub mod composer;
pub mod declaration;
pub mod error;
pub mod execution;
pub mod field;
pub mod manifest;
pub mod policy;
pub mod resolution;
pub mod schema;
pub mod scope;
pub mod steps;
pub mod validation;

#[cfg(test)]
mod tests;

pub use composer::{add_field_authorization, add_object_authorization, add_query_authorization};
pub use declaration::{DeclValue, OperationConfig};
pub use error::{ConfigError, SchemaError};
pub use execution::{execute, AuthorizationHooks, HookFlow, PassThroughHooks};
pub use field::FieldAuthorizer;
pub use policy::{AuthorizationPolicy, Role, Rule};
pub use resolution::{FieldError, Resolution};
pub use schema::{FieldVisibility, ObjectDefinition, OperationField, SchemaAuthorization};
pub use steps::{Middleware, MiddlewareStep, Resolver};
pub use validation::validate;

use std::{fmt, sync::Arc};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::composer::{add_field_authorization, add_object_authorization, add_query_authorization};
use crate::error::SchemaError;
use crate::policy::{AuthorizationPolicy, Rule};
use crate::steps::{MiddlewareStep, Resolver};

pub type PrivatePredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// The `private` declaration of a field.
#[derive(Clone)]
pub enum Private {
    Flag(bool),
    /// Decided per parent value.
    When(PrivatePredicate),
}

impl Private {
    pub fn applies_to(&self, source: &Value) -> bool {
        match self {
            Private::Flag(flag) => *flag,
            Private::When(predicate) => predicate(source),
        }
    }
}

/// Produces the value returned in place of a field the caller may not see.
#[derive(Clone)]
pub enum Anonymizer {
    Unary(Arc<dyn Fn(&Value) -> Value + Send + Sync>),
    /// Also receives the field name.
    Binary(Arc<dyn Fn(&Value, &str) -> Value + Send + Sync>),
}

impl Anonymizer {
    pub fn apply(&self, source: &Value, field: &str) -> Value {
        match self {
            Anonymizer::Unary(anonymize) => anonymize(source),
            Anonymizer::Binary(anonymize) => anonymize(source, field),
        }
    }
}

/// Visibility declaration of a single field.
#[derive(Clone, Default)]
pub struct FieldVisibility {
    pub private: Option<Private>,
    pub rule: Option<Rule>,
    pub anonymizer: Option<Anonymizer>,
}

impl FieldVisibility {
    pub fn public() -> Self {
        Self::default()
    }

    pub fn private() -> Self {
        FieldVisibility {
            private: Some(Private::Flag(true)),
            ..Default::default()
        }
    }

    pub fn private_when<F>(predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        FieldVisibility {
            private: Some(Private::When(Arc::new(predicate))),
            ..Default::default()
        }
    }

    pub fn with_rule(mut self, rule: impl Into<Rule>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    pub fn anonymize_with<F>(mut self, anonymize: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.anonymizer = Some(Anonymizer::Unary(Arc::new(anonymize)));
        self
    }

    pub fn anonymize_field_with<F>(mut self, anonymize: F) -> Self
    where
        F: Fn(&Value, &str) -> Value + Send + Sync + 'static,
    {
        self.anonymizer = Some(Anonymizer::Binary(Arc::new(anonymize)));
        self
    }

    pub fn is_private(&self, source: &Value) -> bool {
        self.private
            .as_ref()
            .is_some_and(|private| private.applies_to(source))
    }
}

impl fmt::Debug for FieldVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let private = match &self.private {
            None => "no",
            Some(Private::Flag(true)) => "yes",
            Some(Private::Flag(false)) => "no",
            Some(Private::When(_)) => "<predicate>",
        };
        f.debug_struct("FieldVisibility")
            .field("private", &private)
            .field("rule", &self.rule)
            .field("anonymizer", &self.anonymizer.is_some())
            .finish()
    }
}

/// Object type metadata, immutable once the schema is built.
#[derive(Debug, Clone, Default)]
pub struct ObjectDefinition {
    pub name: String,
    /// Backing source of the type. Only types declaring one can be used as a `scope`.
    pub source: Option<String>,
    /// `scope?` flag.
    pub scope: Option<bool>,
    /// `scope_field?` flag. Mutually exclusive with `scope`.
    pub scope_field: Option<bool>,
    pub fields: IndexMap<String, FieldVisibility>,
}

impl ObjectDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        ObjectDefinition {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_scope(mut self, scope: bool) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_scope_field(mut self, scope_field: bool) -> Self {
        self.scope_field = Some(scope_field);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, visibility: FieldVisibility) -> Self {
        self.fields.insert(name.into(), visibility);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldVisibility> {
        self.fields.get(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    #[default]
    Query,
    Mutation,
}

/// Root field of the schema a declared step list belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationField {
    pub name: String,
    pub kind: OperationKind,
}

impl OperationField {
    pub fn query(name: impl Into<String>) -> Self {
        OperationField {
            name: name.into(),
            kind: OperationKind::Query,
        }
    }

    pub fn mutation(name: impl Into<String>) -> Self {
        OperationField {
            name: name.into(),
            kind: OperationKind::Mutation,
        }
    }

    /// `__schema`, `__type`, `__typename` and friends never need a permission.
    pub fn is_introspection(&self) -> bool {
        self.name.starts_with("__")
    }
}

pub struct DeclaredOperation<C> {
    pub field: OperationField,
    pub steps: Vec<MiddlewareStep<C>>,
}

/// Object definitions and declared operations of one schema.
pub struct SchemaAuthorization<C> {
    objects: IndexMap<String, Arc<ObjectDefinition>>,
    operations: IndexMap<String, DeclaredOperation<C>>,
}

impl<C> Default for SchemaAuthorization<C> {
    fn default() -> Self {
        SchemaAuthorization {
            objects: IndexMap::new(),
            operations: IndexMap::new(),
        }
    }
}

impl<C> SchemaAuthorization<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, object: ObjectDefinition) -> Arc<ObjectDefinition> {
        let object = Arc::new(object);
        self.objects.insert(object.name.clone(), object.clone());
        object
    }

    pub fn add_operation(&mut self, field: OperationField, steps: Vec<MiddlewareStep<C>>) {
        self.operations
            .insert(field.name.clone(), DeclaredOperation { field, steps });
    }

    pub fn object(&self, name: &str) -> Option<&Arc<ObjectDefinition>> {
        self.objects.get(name)
    }

    pub fn objects(&self) -> impl Iterator<Item = &Arc<ObjectDefinition>> {
        self.objects.values()
    }

    pub fn operations(&self) -> impl Iterator<Item = &DeclaredOperation<C>> {
        self.operations.values()
    }

    /// Composes the step list of every declared operation.
    ///
    /// Stops at the first misconfigured operation.
    pub fn compose<P>(
        &self,
        policy: &P,
    ) -> Result<IndexMap<String, Vec<MiddlewareStep<C>>>, SchemaError>
    where
        P: AuthorizationPolicy<Context = C> + ?Sized,
    {
        let mut composed = IndexMap::with_capacity(self.operations.len());

        for (name, operation) in &self.operations {
            if operation.field.is_introspection() {
                composed.insert(name.clone(), operation.steps.clone());
                continue;
            }

            let steps = add_query_authorization(&operation.steps, &operation.field, policy)?;
            let steps = add_object_authorization(&steps);
            debug!(
                operation = %name,
                kind = %operation.field.kind,
                steps = steps.len(),
                "composed operation authorization"
            );
            composed.insert(name.clone(), steps);
        }

        Ok(composed)
    }

    /// Step list for a non-root field: field authorization followed by the resolver.
    pub fn field_steps(
        &self,
        object: &str,
        field: &str,
        resolver: Arc<dyn Resolver<C>>,
    ) -> Result<Vec<MiddlewareStep<C>>, SchemaError> {
        let object = self
            .objects
            .get(object)
            .ok_or_else(|| SchemaError::UnknownObject(object.to_string()))?;

        Ok(add_field_authorization(
            &[MiddlewareStep::Resolution(resolver)],
            field,
            object,
        ))
    }
}

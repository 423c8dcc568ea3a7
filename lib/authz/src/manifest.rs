//! Binding of an `authz-config` manifest to schema metadata.

use std::sync::Arc;

use ahash::HashSet;
use authz_config::{AuthzManifest, FieldConfig, ObjectConfig, OperationKindConfig, PolicyConfig};
use serde_json::Value;
use tracing::debug;

use crate::declaration::{DeclValue, OperationConfig};
use crate::error::{ConfigError, SchemaError};
use crate::policy::{AuthorizationPolicy, Role, Rule};
use crate::resolution::Resolution;
use crate::schema::{
    Anonymizer, FieldVisibility, ObjectDefinition, OperationField, Private, SchemaAuthorization,
};
use crate::steps::{MiddlewareStep, Resolver};

/// Builds schema metadata and declared step lists from a manifest.
///
/// Every operation ends in the resolver returned by `resolver_for`. Operations
/// with an `authorization` block get a `QueryAuthorization` step in front of it.
pub fn bind_manifest<C, F>(
    manifest: &AuthzManifest,
    resolver_for: F,
) -> Result<SchemaAuthorization<C>, SchemaError>
where
    F: Fn(&str) -> Arc<dyn Resolver<C>>,
{
    let mut schema = SchemaAuthorization::new();

    for (name, object) in &manifest.objects {
        schema.add_object(bind_object(name, object));
    }

    for (name, operation) in &manifest.operations {
        let field = match operation.kind {
            OperationKindConfig::Query => OperationField::query(name.as_str()),
            OperationKindConfig::Mutation => OperationField::mutation(name.as_str()),
        };

        let mut steps = Vec::with_capacity(2);
        if let Some(authorization) = &operation.authorization {
            let config = bind_operation_config(authorization, &schema)
                .map_err(|source| SchemaError::invalid_config(name.as_str(), source))?;
            steps.push(MiddlewareStep::query_authorization(config));
        }
        steps.push(MiddlewareStep::Resolution(resolver_for(name)));

        debug!(operation = %name, kind = %field.kind, "bound operation from manifest");
        schema.add_operation(field, steps);
    }

    Ok(schema)
}

fn bind_object(name: &str, config: &ObjectConfig) -> ObjectDefinition {
    let mut object = ObjectDefinition::new(name);
    object.source = config.source.clone();
    object.scope = config.scope;
    object.scope_field = config.scope_field;

    for (field, field_config) in &config.fields {
        object = object.with_field(field.as_str(), bind_field(field_config));
    }

    object
}

fn bind_field(config: &FieldConfig) -> FieldVisibility {
    FieldVisibility {
        private: config.private.then_some(Private::Flag(true)),
        rule: config.rule.as_deref().map(Rule::from),
        anonymizer: config.anonymize_with.clone().map(|substitute| {
            Anonymizer::Unary(Arc::new(move |_: &Value| substitute.clone()))
        }),
    }
}

/// Converts the untyped `authorization` block of an operation.
///
/// Only the shape of the block is checked here. Option values are left for
/// `validation::validate`, except that a `scope` naming a declared object is
/// bound to that object.
fn bind_operation_config<C>(
    authorization: &Value,
    schema: &SchemaAuthorization<C>,
) -> Result<OperationConfig, ConfigError> {
    let Value::Object(options) = authorization else {
        return Err(ConfigError::NotAMapping(
            DeclValue::from(authorization.clone()).to_string(),
        ));
    };

    let mut config = OperationConfig::default();
    for (option, value) in options {
        let value = DeclValue::from(value.clone());
        match option.as_str() {
            "permit" => config.permit = value,
            "scope" => config.scope = bind_scope(value, schema),
            "args" => config.args = value,
            "rule" => config.rule = value,
            "optional" => config.optional = value,
            unknown => return Err(ConfigError::UnknownOption(unknown.to_string())),
        }
    }

    Ok(config)
}

fn bind_scope<C>(scope: DeclValue, schema: &SchemaAuthorization<C>) -> DeclValue {
    match &scope {
        DeclValue::Str(name) => schema
            .object(name)
            .map(|object| DeclValue::Entity(object.clone()))
            .unwrap_or(scope),
        _ => scope,
    }
}

/// Rules granted to the caller of one request.
#[derive(Debug, Clone, Default)]
pub struct GrantedRules(HashSet<Rule>);

impl GrantedRules {
    pub fn new<I, R>(rules: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Rule>,
    {
        Self(rules.into_iter().map(Into::into).collect())
    }

    pub fn allows(&self, rule: &Rule) -> bool {
        self.0.contains(rule)
    }
}

/// Policy driven by the manifest's `policy` section.
///
/// A caller may see a private field when the field's rule is among the
/// caller's granted rules.
#[derive(Debug, Clone)]
pub struct ManifestPolicy {
    default_rule: Rule,
    not_scoped_roles: HashSet<Role>,
    unauthorized_message: String,
}

impl ManifestPolicy {
    pub fn from_config(config: &PolicyConfig) -> Self {
        ManifestPolicy {
            default_rule: Rule::new(config.default_rule.as_str()),
            not_scoped_roles: config
                .not_scoped_roles()
                .into_iter()
                .map(Role::new)
                .collect(),
            unauthorized_message: config.unauthorized_message.clone(),
        }
    }
}

impl AuthorizationPolicy for ManifestPolicy {
    type Context = GrantedRules;

    fn not_scoped_roles(&self) -> HashSet<Role> {
        self.not_scoped_roles.clone()
    }

    fn default_rule(&self) -> Rule {
        self.default_rule.clone()
    }

    fn context_user_authorized(&self, context: &GrantedRules, _source: &Value, rule: &Rule) -> bool {
        context.allows(rule)
    }

    fn unauthorized_field_message(&self, _resolution: &Resolution<GrantedRules>, field: &str) -> String {
        self.unauthorized_message.replace("{field}", field)
    }
}

#[cfg(test)]
mod tests {
    use authz_config::parse_yaml_manifest;
    use serde_json::json;

    use super::*;
    use crate::execution::{execute, PassThroughHooks};
    use crate::resolution::FieldResult;
    use crate::steps::describe_steps;

    static MANIFEST: &str = r#"
policy:
  not_scoped_roles: [admin]
  unauthorized_message: "Unauthorized access to {field}"
objects:
  User:
    source: users
    fields:
      email:
        private: true
        rule: owner
      phone:
        private: true
        anonymize_with: "***"
  Address:
    scope: false
    fields:
      street:
        private: true
operations:
  user:
    authorization:
      permit: user
      scope: User
      args: id
  users:
    authorization:
      permit: admin
"#;

    fn resolver(_: &str) -> Arc<dyn Resolver<GrantedRules>> {
        Arc::new(|resolution: &Resolution<GrantedRules>| -> FieldResult {
            Ok(resolution.source.get("email").cloned().unwrap_or(Value::Null))
        })
    }

    fn bind(manifest: &str) -> Result<SchemaAuthorization<GrantedRules>, SchemaError> {
        bind_manifest(&parse_yaml_manifest(manifest).unwrap(), resolver)
    }

    #[test]
    fn composes_manifest_operations() {
        let manifest = parse_yaml_manifest(MANIFEST).unwrap();
        let policy = ManifestPolicy::from_config(&manifest.policy);
        let schema = bind_manifest(&manifest, resolver).unwrap();
        let composed = schema.compose(&policy).unwrap();

        insta::assert_snapshot!(
            composed
                .iter()
                .map(|(name, steps)| format!("{}: {}", name, describe_steps(steps)))
                .collect::<Vec<_>>()
                .join("\n"),
            @r#"
        user: ObjectAuthorization -> QueryAuthorization("user") -> Resolution
        users: ObjectAuthorization -> QueryAuthorization("admin") -> Resolution
        "#
        );
    }

    #[test]
    fn scope_names_are_bound_to_declared_objects() {
        let schema = bind(MANIFEST).unwrap();
        let user = schema.operations().find(|op| op.field.name == "user").unwrap();

        match &user.steps[0] {
            MiddlewareStep::QueryAuthorization(config) => {
                assert_eq!(config.scope.to_string(), "<entity User>");
                assert_eq!(config.permit_role(), Some(Role::from("user")));
            }
            other => panic!("unexpected step {}", other),
        }
    }

    #[test]
    fn unbacked_scope_fails_composition() {
        let schema = bind(
            r#"
objects:
  Address: {}
operations:
  address:
    authorization: { permit: user, scope: Address }
"#,
        )
        .unwrap();
        let policy = ManifestPolicy::from_config(&PolicyConfig::default());

        insta::assert_snapshot!(
            schema.compose(&policy).unwrap_err(),
            @"Invalid authorization for query address: scope option is not a valid scoped entity: Address"
        );
    }

    #[test]
    fn operation_without_authorization_fails_composition() {
        let schema = bind(
            r#"
operations:
  deleteUser:
    kind: mutation
"#,
        )
        .unwrap();
        let policy = ManifestPolicy::from_config(&PolicyConfig::default());

        insta::assert_snapshot!(
            schema.compose(&policy).unwrap_err(),
            @"no permission specified for query deleteUser"
        );
    }

    #[test]
    fn malformed_authorization_blocks_are_rejected_while_binding() {
        let unknown = bind(
            r#"
operations:
  user:
    authorization: { permit: user, scopes: false }
"#,
        );
        insta::assert_snapshot!(
            unknown.err().unwrap(),
            @"Invalid authorization for query user: unknown authorization option: scopes"
        );

        let not_a_mapping = bind(
            r#"
operations:
  user:
    authorization: user
"#,
        );
        insta::assert_snapshot!(
            not_a_mapping.err().unwrap(),
            @r#"Invalid authorization for query user: authorization declaration must be a mapping, got: "user""#
        );
    }

    #[test]
    fn field_rules_use_granted_rules() {
        let manifest = parse_yaml_manifest(MANIFEST).unwrap();
        let policy = ManifestPolicy::from_config(&manifest.policy);
        let schema = bind_manifest(&manifest, resolver).unwrap();
        let source = json!({"email": "ada@example.com"});

        let run = |field: &str, granted: GrantedRules| {
            let steps = schema.field_steps("User", field, resolver(field)).unwrap();
            let mut resolution = Resolution::new(source.clone(), granted);
            execute(&steps, &mut resolution, &policy, &PassThroughHooks).unwrap();
            resolution.into_result().unwrap()
        };

        assert_eq!(
            run("email", GrantedRules::new(["owner"])),
            Ok(json!("ada@example.com"))
        );
        assert_eq!(
            run("email", GrantedRules::default()).unwrap_err().message,
            "Unauthorized access to email"
        );
        assert_eq!(run("phone", GrantedRules::default()), Ok(json!("***")));
    }

    #[test]
    fn unscoped_objects_skip_field_rules() {
        let schema = bind(MANIFEST).unwrap();
        let policy = ManifestPolicy::from_config(&PolicyConfig::default());
        let steps = schema
            .field_steps("Address", "street", resolver("street"))
            .unwrap();
        let mut resolution = Resolution::new(json!({"email": "x"}), GrantedRules::default());

        execute(&steps, &mut resolution, &policy, &PassThroughHooks).unwrap();

        assert_eq!(resolution.into_result(), Some(Ok(json!("x"))));
    }
}

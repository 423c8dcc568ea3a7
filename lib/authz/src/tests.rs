use std::sync::Arc;

use serde_json::{json, Value};

use crate::{
    execute, AuthorizationHooks, DeclValue, FieldVisibility, HookFlow, MiddlewareStep,
    ObjectDefinition, OperationConfig, OperationField, Resolution, SchemaAuthorization,
};
use crate::execution::PassThroughHooks;
use crate::resolution::{FieldError, FieldResult};
use crate::steps::describe_steps;

pub(crate) mod helpers {
    use ahash::HashSet;
    use serde_json::Value;

    use crate::policy::{AuthorizationPolicy, Role, Rule};
    use crate::resolution::Resolution;
    use crate::steps::Middleware;

    #[derive(Debug, Clone, Default)]
    pub struct Caller {
        pub user_id: Option<String>,
    }

    impl Caller {
        pub fn anonymous() -> Self {
            Self::default()
        }

        pub fn user(id: &str) -> Self {
            Caller {
                user_id: Some(id.to_string()),
            }
        }
    }

    #[derive(Debug, Clone, Default)]
    enum Decision {
        #[default]
        Deny,
        Allow,
        AllowRules(HashSet<Rule>),
        /// Caller's id must equal the source's `id`.
        Owner,
    }

    #[derive(Debug, Clone, Default)]
    pub struct TestPolicy {
        not_scoped: HashSet<Role>,
        decision: Decision,
    }

    impl TestPolicy {
        pub fn denying() -> Self {
            Self::default()
        }

        pub fn allowing() -> Self {
            TestPolicy {
                decision: Decision::Allow,
                ..Default::default()
            }
        }

        pub fn allowing_rules(rules: &[&str]) -> Self {
            TestPolicy {
                decision: Decision::AllowRules(rules.iter().map(|rule| Rule::from(*rule)).collect()),
                ..Default::default()
            }
        }

        pub fn owner() -> Self {
            TestPolicy {
                decision: Decision::Owner,
                ..Default::default()
            }
        }

        pub fn not_scoped(mut self, roles: &[&str]) -> Self {
            self.not_scoped = roles.iter().map(|role| Role::from(*role)).collect();
            self
        }
    }

    impl AuthorizationPolicy for TestPolicy {
        type Context = Caller;

        fn not_scoped_roles(&self) -> HashSet<Role> {
            self.not_scoped.clone()
        }

        fn default_rule(&self) -> Rule {
            Rule::default()
        }

        fn context_user_authorized(&self, context: &Caller, source: &Value, rule: &Rule) -> bool {
            match &self.decision {
                Decision::Deny => false,
                Decision::Allow => true,
                Decision::AllowRules(rules) => rules.contains(rule),
                Decision::Owner => context
                    .user_id
                    .as_deref()
                    .is_some_and(|id| source["id"].as_str() == Some(id)),
            }
        }

        fn unauthorized_field_message(&self, _resolution: &Resolution<Caller>, field: &str) -> String {
            format!("Not authorized to access field {}", field)
        }
    }

    /// Middleware that does nothing, named for step list snapshots.
    pub struct Noop(pub &'static str);

    impl<C> Middleware<C> for Noop {
        fn name(&self) -> &str {
            self.0
        }

        fn call(&self, _resolution: &mut Resolution<C>) {}
    }
}

use helpers::{Caller, TestPolicy};

fn echo(field: &'static str) -> MiddlewareStep<Caller> {
    MiddlewareStep::resolution(move |resolution: &Resolution<Caller>| -> FieldResult {
        Ok(resolution.source[field].clone())
    })
}

fn user_object() -> ObjectDefinition {
    ObjectDefinition::new("User")
        .with_source("users")
        .with_field("name", FieldVisibility::public())
        .with_field("email", FieldVisibility::private())
        .with_field(
            "phone",
            FieldVisibility::private().anonymize_with(|_| json!("hidden")),
        )
}

fn ada() -> Value {
    json!({"id": "1", "name": "Ada", "email": "ada@example.com", "phone": "555"})
}

#[cfg(test)]
mod composition {
    use super::*;

    #[test]
    fn operation_without_declared_authorization_cannot_be_served() {
        let mut schema = SchemaAuthorization::new();
        let user = schema.add_object(user_object());

        // The declaration exists, but never made it into the step list.
        let _declared = OperationConfig::new("user")
            .scope(DeclValue::entity(user))
            .args("id");
        schema.add_operation(OperationField::query("user"), vec![echo("name")]);

        insta::assert_snapshot!(
            schema.compose(&TestPolicy::default()).unwrap_err(),
            @"no permission specified for query user"
        );
    }

    #[test]
    fn declared_operations_get_object_authorization() {
        let mut schema = SchemaAuthorization::new();
        let user = schema.add_object(user_object());

        schema.add_operation(
            OperationField::query("user"),
            vec![
                MiddlewareStep::query_authorization(
                    OperationConfig::new("user")
                        .scope(DeclValue::entity(user))
                        .args("id"),
                ),
                echo("name"),
            ],
        );
        schema.add_operation(
            OperationField::mutation("updateProfile"),
            vec![
                MiddlewareStep::query_authorization(
                    OperationConfig::new("user")
                        .scope(DeclValue::name("$source"))
                        .args(DeclValue::map([("input", DeclValue::list(["id"]))])),
                ),
                echo("name"),
            ],
        );
        schema.add_operation(OperationField::query("__type"), vec![echo("name")]);

        let composed = schema.compose(&TestPolicy::default()).unwrap();

        insta::assert_snapshot!(
            composed
                .iter()
                .map(|(name, steps)| format!("{}: {}", name, describe_steps(steps)))
                .collect::<Vec<_>>()
                .join("\n"),
            @r#"
        user: ObjectAuthorization -> QueryAuthorization("user") -> Resolution
        updateProfile: ObjectAuthorization -> QueryAuthorization("user") -> Resolution
        __type: Resolution
        "#
        );
    }

    #[test]
    fn first_invalid_operation_aborts_composition() {
        let mut schema = SchemaAuthorization::new();
        schema.add_operation(
            OperationField::query("users"),
            vec![
                MiddlewareStep::query_authorization(OperationConfig::new("admin").optional("no")),
                echo("name"),
            ],
        );

        insta::assert_snapshot!(
            schema
                .compose(&TestPolicy::default().not_scoped(&["admin"]))
                .unwrap_err(),
            @r#"Invalid authorization for query users: optional option must be a boolean, got: "no""#
        );
    }

    #[test]
    fn field_steps_require_a_known_object() {
        let schema = SchemaAuthorization::<Caller>::new();
        let resolver = match echo("name") {
            MiddlewareStep::Resolution(resolver) => resolver,
            _ => unreachable!(),
        };

        insta::assert_snapshot!(
            schema.field_steps("Ghost", "name", resolver).unwrap_err(),
            @"unknown object type: Ghost"
        );
    }
}

#[cfg(test)]
mod request {
    use super::*;

    fn resolve_field(
        schema: &SchemaAuthorization<Caller>,
        policy: &TestPolicy,
        field: &'static str,
        caller: Caller,
    ) -> FieldResult {
        let resolver = match echo(field) {
            MiddlewareStep::Resolution(resolver) => resolver,
            _ => unreachable!(),
        };
        let steps = schema.field_steps("User", field, resolver).unwrap();
        let mut resolution = Resolution::new(ada(), caller).with_path(["user", field]);

        execute(&steps, &mut resolution, policy, &PassThroughHooks).unwrap();
        resolution.into_result().unwrap()
    }

    fn schema() -> SchemaAuthorization<Caller> {
        let mut schema = SchemaAuthorization::new();
        schema.add_object(user_object());
        schema
    }

    #[test]
    fn owner_sees_private_fields() {
        let policy = TestPolicy::owner();

        assert_eq!(
            resolve_field(&schema(), &policy, "email", Caller::user("1")),
            Ok(json!("ada@example.com"))
        );
    }

    #[test]
    fn denied_field_does_not_affect_siblings() {
        let schema = schema();
        let policy = TestPolicy::owner();
        let stranger = Caller::user("2");

        let name = resolve_field(&schema, &policy, "name", stranger.clone());
        let email = resolve_field(&schema, &policy, "email", stranger.clone());
        let phone = resolve_field(&schema, &policy, "phone", stranger);

        assert_eq!(name, Ok(json!("Ada")));
        assert_eq!(
            email,
            Err(FieldError::unauthorized(
                "Not authorized to access field email",
                &["user".to_string(), "email".to_string()]
            ))
        );
        assert_eq!(phone, Ok(json!("hidden")));
    }

    #[test]
    fn sibling_fields_resolve_concurrently() {
        let schema = schema();
        let policy = TestPolicy::owner();

        let results = std::thread::scope(|scope| {
            let handles = ["name", "email", "phone"]
                .into_iter()
                .map(|field| {
                    let schema = &schema;
                    let policy = &policy;
                    scope.spawn(move || resolve_field(schema, policy, field, Caller::anonymous()))
                })
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect::<Vec<_>>()
        });

        assert_eq!(results[0], Ok(json!("Ada")));
        assert!(results[1].is_err());
        assert_eq!(results[2], Ok(json!("hidden")));
    }

    struct DenyAnonymous;

    impl AuthorizationHooks<Caller> for DenyAnonymous {
        fn on_query_authorization(
            &self,
            config: &OperationConfig,
            resolution: &Resolution<Caller>,
        ) -> HookFlow {
            if resolution.context.user_id.is_some() {
                return HookFlow::Proceed;
            }
            let permit = config.permit_role().map(|role| role.to_string()).unwrap_or_default();
            HookFlow::EndWithResult(Err(FieldError::new(format!("{} role required", permit))))
        }
    }

    #[test]
    fn query_hook_can_end_resolution_early() {
        let steps = crate::add_object_authorization(&[
            MiddlewareStep::query_authorization(OperationConfig::new("user").scope(false)),
            echo("name"),
        ]);

        let mut anonymous = Resolution::new(ada(), Caller::anonymous());
        execute(&steps, &mut anonymous, &TestPolicy::allowing(), &DenyAnonymous).unwrap();
        assert_eq!(
            anonymous.into_result(),
            Some(Err(FieldError::new("user role required")))
        );

        let mut known = Resolution::new(ada(), Caller::user("1"));
        execute(&steps, &mut known, &TestPolicy::allowing(), &DenyAnonymous).unwrap();
        assert_eq!(known.into_result(), Some(Ok(json!("Ada"))));
    }

    #[test]
    fn conflicting_scope_flags_abort_the_field() {
        let object = Arc::new(user_object().with_scope(true).with_scope_field(false));
        let steps = crate::add_field_authorization(&[echo("name")], "name", &object);
        let mut resolution = Resolution::new(ada(), Caller::anonymous());

        let err = execute(&steps, &mut resolution, &TestPolicy::allowing(), &PassThroughHooks)
            .unwrap_err();

        insta::assert_snapshot!(err, @"object User declares both scope? and scope_field?, only one is allowed");
        assert!(!resolution.is_resolved());
    }
}

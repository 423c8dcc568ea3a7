use tracing::{debug, trace};

use crate::error::SchemaError;
use crate::policy::AuthorizationPolicy;
use crate::resolution::{FieldError, Resolution};
use crate::schema::ObjectDefinition;

/// Request-time field visibility check.
///
/// A field is only checked against the policy when its object is scoped and
/// the field is private for the current parent value. A denied field gets
/// either its anonymized value or the policy's error, never both.
pub struct FieldAuthorizer;

impl FieldAuthorizer {
    pub fn call<P>(
        resolution: &mut Resolution<P::Context>,
        object: &ObjectDefinition,
        field: &str,
        policy: &P,
    ) -> Result<(), SchemaError>
    where
        P: AuthorizationPolicy + ?Sized,
    {
        let visibility = object.field(field);
        let private = visibility.is_some_and(|visibility| visibility.is_private(&resolution.source));
        let scoped = object_scope_flag(object)?;
        let rule = visibility
            .and_then(|visibility| visibility.rule.clone())
            .unwrap_or_else(|| policy.default_rule());
        let anonymizer = visibility.and_then(|visibility| visibility.anonymizer.as_ref());

        trace!(
            object = %object.name,
            field,
            scoped,
            private,
            rule = %rule,
            "evaluating field authorization"
        );

        if !(scoped && private) {
            return Ok(());
        }

        if policy.context_user_authorized(&resolution.context, &resolution.source, &rule) {
            return Ok(());
        }

        match anonymizer {
            Some(anonymizer) => {
                debug!(object = %object.name, field, "unauthorized field, anonymizing");
                let value = anonymizer.apply(&resolution.source, field);
                resolution.put_result(Ok(value));
            }
            None => {
                debug!(object = %object.name, field, "unauthorized field");
                let message = policy.unauthorized_field_message(resolution, field);
                let error = FieldError::unauthorized(message, &resolution.path);
                resolution.put_result(Err(error));
            }
        }

        Ok(())
    }
}

/// `scope?` and `scope_field?` are mutually exclusive, an object without either is scoped.
fn object_scope_flag(object: &ObjectDefinition) -> Result<bool, SchemaError> {
    match (object.scope, object.scope_field) {
        (None, None) => Ok(true),
        (None, Some(scope_field)) => Ok(scope_field),
        (Some(scope), None) => Ok(scope),
        (Some(_), Some(_)) => Err(SchemaError::ConflictingScopeFlags {
            object: object.name.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::schema::FieldVisibility;
    use crate::tests::helpers::{Caller, TestPolicy};

    fn user() -> ObjectDefinition {
        ObjectDefinition::new("User")
            .with_source("users")
            .with_field("name", FieldVisibility::public())
            .with_field("email", FieldVisibility::private())
            .with_field(
                "phone",
                FieldVisibility::private().anonymize_with(|_| json!("***")),
            )
            .with_field(
                "address",
                FieldVisibility::private_when(|source| source["hidden"] == json!(true)),
            )
            .with_field(
                "salary",
                FieldVisibility::private()
                    .with_rule("payroll")
                    .anonymize_field_with(|source, field| {
                        json!(format!("{}:{}", source["id"].as_str().unwrap_or("?"), field))
                    }),
            )
    }

    fn resolve(
        object: &ObjectDefinition,
        field: &str,
        policy: &TestPolicy,
        source: Value,
    ) -> Resolution<Caller> {
        let mut resolution =
            Resolution::new(source, Caller::anonymous()).with_path(["user", field]);
        FieldAuthorizer::call(&mut resolution, object, field, policy).unwrap();
        resolution
    }

    #[test]
    fn private_field_denied_without_anonymizer_gets_policy_error() {
        let resolution = resolve(&user(), "email", &TestPolicy::denying(), json!({"id": "1"}));
        let error = resolution.result().unwrap().clone().unwrap_err();

        insta::assert_snapshot!(
            serde_json::to_string(&error).unwrap(),
            @r#"{"message":"Not authorized to access field email","path":["user","email"],"extensions":{"code":"UNAUTHORIZED_FIELD"}}"#
        );
    }

    #[test]
    fn private_field_denied_with_anonymizer_gets_substitute() {
        let resolution = resolve(&user(), "phone", &TestPolicy::denying(), json!({"id": "1"}));

        assert_eq!(resolution.result(), Some(&Ok(json!("***"))));
    }

    #[test]
    fn two_argument_anonymizer_receives_field_name() {
        let resolution = resolve(&user(), "salary", &TestPolicy::denying(), json!({"id": "7"}));

        assert_eq!(resolution.result(), Some(&Ok(json!("7:salary"))));
    }

    #[test]
    fn authorized_caller_passes_through() {
        let resolution = resolve(&user(), "email", &TestPolicy::allowing(), json!({"id": "1"}));

        assert!(!resolution.is_resolved());
    }

    #[test]
    fn public_and_undeclared_fields_pass_through() {
        let policy = TestPolicy::denying();

        assert!(!resolve(&user(), "name", &policy, json!({})).is_resolved());
        assert!(!resolve(&user(), "nickname", &policy, json!({})).is_resolved());
    }

    #[test]
    fn predicate_privacy_depends_on_source() {
        let policy = TestPolicy::denying();

        assert!(!resolve(&user(), "address", &policy, json!({"hidden": false})).is_resolved());
        assert!(resolve(&user(), "address", &policy, json!({"hidden": true})).is_resolved());
    }

    #[test]
    fn unscoped_object_always_passes() {
        let policy = TestPolicy::denying();
        let object = user().with_scope(false);

        for field in ["email", "phone", "address", "salary"] {
            let resolution = resolve(&object, field, &policy, json!({"hidden": true}));
            assert!(!resolution.is_resolved(), "{} should pass", field);
        }
    }

    #[test]
    fn scope_field_flag_governs_when_declared_alone() {
        let policy = TestPolicy::denying();

        let unscoped = user().with_scope_field(false);
        assert!(!resolve(&unscoped, "email", &policy, json!({})).is_resolved());

        let scoped = user().with_scope_field(true);
        assert!(resolve(&scoped, "email", &policy, json!({})).is_resolved());
    }

    #[test]
    fn field_rule_overrides_default_rule() {
        let policy = TestPolicy::allowing_rules(&["payroll"]);

        assert!(!resolve(&user(), "salary", &policy, json!({"id": "1"})).is_resolved());
        assert!(resolve(&user(), "email", &policy, json!({"id": "1"})).is_resolved());
    }

    #[test]
    fn conflicting_scope_flags_are_a_configuration_error() {
        let object = user().with_scope(true).with_scope_field(true);
        let mut resolution = Resolution::new(json!({}), Caller::anonymous());

        let err = FieldAuthorizer::call(&mut resolution, &object, "name", &TestPolicy::allowing())
            .unwrap_err();

        insta::assert_snapshot!(err, @"object User declares both scope? and scope_field?, only one is allowed");
    }
}

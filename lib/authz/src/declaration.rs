use std::{fmt, sync::Arc};

use serde_json::Value;

use crate::policy::{Role, Rule};
use crate::schema::ObjectDefinition;

/// One-argument predicate over a request argument value.
pub type ArgPredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Sentinel `scope` value meaning "scope is the resolution source itself".
pub const SOURCE_SCOPE: &str = "$source";

/// A loosely typed declaration value.
///
/// Operation options are kept in this form until validation, so declarations
/// written in code and declarations read from a manifest go through exactly
/// the same shape checks.
#[derive(Clone, Default)]
pub enum DeclValue {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Str(String),
    List(Vec<DeclValue>),
    /// Ordered key/value pairs.
    Map(Vec<(String, DeclValue)>),
    Predicate(ArgPredicate),
    Entity(Arc<ObjectDefinition>),
}

impl DeclValue {
    pub fn name(name: impl Into<String>) -> Self {
        DeclValue::Str(name.into())
    }

    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DeclValue>,
    {
        DeclValue::List(items.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DeclValue>,
    {
        DeclValue::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        DeclValue::Predicate(Arc::new(f))
    }

    pub fn entity(object: Arc<ObjectDefinition>) -> Self {
        DeclValue::Entity(object)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DeclValue::Null)
    }

    /// Returns the name if this value is a bare symbolic name.
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            DeclValue::Str(name) if is_symbolic_name(name) => Some(name),
            _ => None,
        }
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`, optionally ending in a single `?` or `!`.
pub fn is_symbolic_name(name: &str) -> bool {
    let body = name
        .strip_suffix('?')
        .or_else(|| name.strip_suffix('!'))
        .unwrap_or(name);

    let mut chars = body.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for DeclValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclValue::Null => write!(f, "null"),
            DeclValue::Bool(value) => write!(f, "{}", value),
            DeclValue::Number(value) => write!(f, "{}", value),
            DeclValue::Str(value) => write!(f, "{:?}", value),
            DeclValue::List(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            DeclValue::Map(entries) => {
                write!(f, "{{")?;
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            DeclValue::Predicate(_) => write!(f, "<predicate>"),
            DeclValue::Entity(object) => write!(f, "<entity {}>", object.name),
        }
    }
}

impl fmt::Debug for DeclValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<&str> for DeclValue {
    fn from(value: &str) -> Self {
        DeclValue::Str(value.to_string())
    }
}

impl From<String> for DeclValue {
    fn from(value: String) -> Self {
        DeclValue::Str(value)
    }
}

impl From<bool> for DeclValue {
    fn from(value: bool) -> Self {
        DeclValue::Bool(value)
    }
}

impl From<i64> for DeclValue {
    fn from(value: i64) -> Self {
        DeclValue::Number(value.into())
    }
}

impl From<Arc<ObjectDefinition>> for DeclValue {
    fn from(object: Arc<ObjectDefinition>) -> Self {
        DeclValue::Entity(object)
    }
}

impl From<Value> for DeclValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => DeclValue::Null,
            Value::Bool(value) => DeclValue::Bool(value),
            Value::Number(value) => DeclValue::Number(value),
            Value::String(value) => DeclValue::Str(value),
            Value::Array(items) => DeclValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(entries) => DeclValue::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, value.into()))
                    .collect(),
            ),
        }
    }
}

/// Authorization declaration attached to one query or mutation.
///
/// Options are stored as declared. `validation::validate` decides whether
/// they are well formed; the typed accessors below assume that it passed.
#[derive(Clone, Debug, Default)]
pub struct OperationConfig {
    pub permit: DeclValue,
    pub scope: DeclValue,
    pub args: DeclValue,
    pub rule: DeclValue,
    pub optional: DeclValue,
}

impl OperationConfig {
    pub fn new(permit: impl Into<DeclValue>) -> Self {
        OperationConfig {
            permit: permit.into(),
            ..Default::default()
        }
    }

    pub fn scope(mut self, scope: impl Into<DeclValue>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn args(mut self, args: impl Into<DeclValue>) -> Self {
        self.args = args.into();
        self
    }

    pub fn rule(mut self, rule: impl Into<DeclValue>) -> Self {
        self.rule = rule.into();
        self
    }

    pub fn optional(mut self, optional: impl Into<DeclValue>) -> Self {
        self.optional = optional.into();
        self
    }

    pub fn permit_role(&self) -> Option<Role> {
        self.permit.as_symbol().map(Role::new)
    }

    /// The declared rule, or `default` when the operation doesn't override it.
    pub fn rule_or(&self, default: Rule) -> Rule {
        self.rule.as_symbol().map(Rule::new).unwrap_or(default)
    }

    pub fn is_optional(&self) -> bool {
        matches!(self.optional, DeclValue::Bool(true))
    }
}

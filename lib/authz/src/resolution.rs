use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const UNAUTHORIZED_FIELD_CODE: &str = "UNAUTHORIZED_FIELD";

/// Error attached to a single field's result, in GraphQL error shape.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl FieldError {
    pub fn new(message: impl Into<String>) -> Self {
        FieldError {
            message: message.into(),
            path: None,
            extensions: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>, path: &[String]) -> Self {
        FieldError {
            message: message.into(),
            path: (!path.is_empty()).then(|| path.to_vec()),
            extensions: Some(json!({ "code": UNAUTHORIZED_FIELD_CODE })),
        }
    }
}

impl From<String> for FieldError {
    fn from(message: String) -> Self {
        FieldError::new(message)
    }
}

pub type FieldResult = Result<Value, FieldError>;

/// In-flight resolution of one field for one request.
///
/// Steps only ever mutate the `result` slot. Once it is set the remaining
/// steps are skipped.
#[derive(Debug, Clone)]
pub struct Resolution<C> {
    /// Parent value the field is resolved from.
    pub source: Value,
    pub context: C,
    pub arguments: Map<String, Value>,
    /// Response path of the field, root first.
    pub path: Vec<String>,
    result: Option<FieldResult>,
}

impl<C> Resolution<C> {
    pub fn new(source: Value, context: C) -> Self {
        Resolution {
            source,
            context,
            arguments: Map::new(),
            path: Vec::new(),
            result: None,
        }
    }

    pub fn with_arguments(mut self, arguments: Map<String, Value>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path = path.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.result.is_some()
    }

    pub fn result(&self) -> Option<&FieldResult> {
        self.result.as_ref()
    }

    pub fn put_result(&mut self, result: FieldResult) {
        self.result = Some(result);
    }

    pub fn into_result(self) -> Option<FieldResult> {
        self.result
    }
}

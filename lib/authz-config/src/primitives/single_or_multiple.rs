use std::borrow::Cow;

use schemars::{json_schema, JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};

/// Accepts either `role` or `[role, other_role]` in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SingleOrMultiple<T> {
    Single(T),
    Multiple(Vec<T>),
}

impl<T> SingleOrMultiple<T> {
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            SingleOrMultiple::Single(item) => std::slice::from_ref(item).iter(),
            SingleOrMultiple::Multiple(items) => items.iter(),
        }
    }
}

impl<T> From<SingleOrMultiple<T>> for Vec<T> {
    fn from(val: SingleOrMultiple<T>) -> Self {
        match val {
            SingleOrMultiple::Single(item) => vec![item],
            SingleOrMultiple::Multiple(items) => items,
        }
    }
}

impl<T: JsonSchema> JsonSchema for SingleOrMultiple<T> {
    fn schema_name() -> Cow<'static, str> {
        format!("SingleOrMultiple<{}>", T::schema_name()).into()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "anyOf": [
                generator.subschema_for::<T>(),
                generator.subschema_for::<Vec<T>>()
            ]
        })
    }
}

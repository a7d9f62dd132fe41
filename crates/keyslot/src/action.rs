//! The open action record passed to dispatchers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An action: a `type` tag plus arbitrary payload fields.
///
/// Serializes as `{ "type": "...", ...payload }`. Reducers that know their
/// action set statically should convert to their own enum (see
/// [`CollectionAction`](crate::CollectionAction)) instead of poking at
/// payload fields directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Action {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Map::new(),
        }
    }

    /// Add a payload field.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.payload.get(field)
    }

    /// Parse an action from a JSON object. A missing `type` becomes `""`.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn to_value(&self) -> Value {
        let mut object = self.payload.clone();
        object.insert("type".to_owned(), Value::String(self.kind.clone()));
        Value::Object(object)
    }
}

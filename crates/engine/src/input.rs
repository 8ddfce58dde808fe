//! Operation input payloads as seen by the endpoint stage.

use std::any::Any;

use serde::Serialize;
use serde_json::{Map as JsonMap, Value};

/// The caller-supplied input of an operation.
///
/// The endpoint stage only needs two things from an input: the name of the shape it
/// claims to be (checked against the operation's declared input shape) and the raw
/// value of individual members that are bound to endpoint parameters.
pub trait OperationInput: Any + Send {
    /// Name of the input shape, e.g. `GetObjectInput`.
    fn shape_name(&self) -> &str;

    /// Raw value of a member. `None` and `Some(Value::Null)` both mean "unset".
    fn member(&self, name: &str) -> Option<Value>;
}

/// Model-driven operation input backed by a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonInput {
    shape: String,
    members: JsonMap<String, Value>,
}

impl JsonInput {
    pub fn new(shape: impl Into<String>, members: JsonMap<String, Value>) -> Self {
        Self {
            shape: shape.into(),
            members,
        }
    }

    pub fn empty(shape: impl Into<String>) -> Self {
        Self::new(shape, JsonMap::new())
    }

    /// Build an input from any serializable structure. Non-object payloads are rejected.
    pub fn from_serializable<T: Serialize>(shape: impl Into<String>, payload: &T) -> anyhow::Result<Self> {
        match serde_json::to_value(payload)? {
            Value::Object(members) => Ok(Self::new(shape, members)),
            other => Err(anyhow::anyhow!("operation input must serialize to an object, got {}", other)),
        }
    }

    pub fn with_member(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.members.insert(name.into(), value.into());
        self
    }
}

impl OperationInput for JsonInput {
    fn shape_name(&self) -> &str {
        &self.shape
    }

    fn member(&self, name: &str) -> Option<Value> {
        self.members.get(name).cloned()
    }
}

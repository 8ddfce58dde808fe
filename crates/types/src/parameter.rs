//! Endpoint parameter declarations and their values.
//!
//! A service declares an ordered catalog of endpoint parameters. Each parameter is
//! either populated by a built-in handler (client or environment state) or bound
//! from client configuration, operation input, or operation constants. Values are
//! restricted to the closed set of [`ParameterType`]s; every site that converts or
//! assigns a value matches on that enum exhaustively.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

static PARAMETER_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("valid parameter name regex"));

/// Declared type of an endpoint parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Boolean,
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterType::String => f.write_str("string"),
            ParameterType::Boolean => f.write_str("boolean"),
        }
    }
}

/// A concrete parameter value. The variant always agrees with the declared [`ParameterType`]
/// of the parameter it is assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    String(String),
    Boolean(bool),
}

impl ParameterValue {
    /// Encode a JSON value as the given parameter type.
    ///
    /// Only exact matches are accepted: a JSON string for [`ParameterType::String`] and a
    /// JSON boolean for [`ParameterType::Boolean`]. No coercion is attempted, so `"true"`
    /// is not a boolean and `true` is not a string.
    pub fn from_json(parameter_type: ParameterType, value: &Value) -> Result<Self, ValueTypeError> {
        match (parameter_type, value) {
            (ParameterType::String, Value::String(text)) => Ok(ParameterValue::String(text.clone())),
            (ParameterType::Boolean, Value::Bool(flag)) => Ok(ParameterValue::Boolean(*flag)),
            (expected, other) => Err(ValueTypeError {
                expected,
                found: json_kind(other),
            }),
        }
    }

    /// The type this value encodes.
    pub fn parameter_type(&self) -> ParameterType {
        match self {
            ParameterValue::String(_) => ParameterType::String,
            ParameterValue::Boolean(_) => ParameterType::Boolean,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::String(text) => Some(text.as_str()),
            ParameterValue::Boolean(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Boolean(flag) => Some(*flag),
            ParameterValue::String(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ParameterValue::String(text) => Value::String(text.clone()),
            ParameterValue::Boolean(flag) => Value::Bool(*flag),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::String(text) => write!(f, "{text:?}"),
            ParameterValue::Boolean(flag) => write!(f, "{flag}"),
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::String(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::String(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Boolean(value)
    }
}

/// Raised when a JSON value cannot be encoded as a declared parameter type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected a {expected} value, found {found}")]
pub struct ValueTypeError {
    pub expected: ParameterType,
    pub found: &'static str,
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single declared endpoint parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    /// Parameter name, unique within the service.
    pub name: String,
    /// Declared value type.
    pub r#type: ParameterType,
    /// Built-in identifier (for example `SDK::Region`) when the value comes from client
    /// or environment state rather than from a binding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_in: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

impl Parameter {
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParameterType::String)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParameterType::Boolean)
    }

    fn new(name: impl Into<String>, r#type: ParameterType) -> Self {
        Self {
            name: name.into(),
            r#type,
            built_in: None,
            required: false,
            documentation: None,
        }
    }

    /// Mark the parameter as populated by the built-in handler under `identifier`.
    pub fn with_built_in(mut self, identifier: impl Into<String>) -> Self {
        self.built_in = Some(identifier.into());
        self
    }

    pub fn is_built_in(&self) -> bool {
        self.built_in.is_some()
    }

    /// Whether the name is usable as a record field name.
    pub fn has_valid_name(&self) -> bool {
        is_valid_parameter_name(&self.name)
    }
}

/// Parameter names must start with an ASCII letter and contain only letters, digits, or `_`.
pub fn is_valid_parameter_name(name: &str) -> bool {
    PARAMETER_NAME_PATTERN.is_match(name)
}

/// The ordered parameter catalog of one service.
///
/// Declaration order is preserved and drives the field order of every resolved
/// record. The set is read-only once handed over by the model provider; name
/// uniqueness is checked when bindings are compiled rather than here, so a
/// malformed model can still be represented and reported on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceParameterSet {
    parameters: Vec<Parameter>,
}

impl ServiceParameterSet {
    pub fn new(parameters: Vec<Parameter>) -> Self {
        Self { parameters }
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|parameter| parameter.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    pub fn built_ins(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|parameter| parameter.is_built_in())
    }

    pub fn has_built_ins(&self) -> bool {
        self.parameters.iter().any(Parameter::is_built_in)
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

impl FromIterator<Parameter> for ServiceParameterSet {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ServiceParameterSet {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.parameters.iter()
    }
}

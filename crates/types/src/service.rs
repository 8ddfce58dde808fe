//! Service and operation declarations consumed by the binding engine.
//!
//! These models are supplied read-only by a model provider. They mirror the three
//! declaration sources that may target an endpoint parameter:
//!
//! - service-wide client context parameters ([`ClientContextParams`]),
//! - per-operation input members tagged with a context parameter ([`InputMember::context_param`]),
//! - per-operation static constants ([`OperationModel::static_context_params`]).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parameter::{ParameterType, ServiceParameterSet};

/// Declarative description of a single service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceModel {
    pub name: String,
    /// Endpoint rule set. Operations of a service without one get no endpoint stage.
    #[serde(default)]
    pub endpoint_rules: Option<EndpointRuleSet>,
    #[serde(default)]
    pub client_context_params: Option<ClientContextParams>,
    #[serde(default)]
    pub operations: Vec<OperationModel>,
}

impl ServiceModel {
    /// Parameter catalog of the rule set, if the service declares one.
    pub fn parameters(&self) -> Option<&ServiceParameterSet> {
        self.endpoint_rules.as_ref().map(|rules| &rules.parameters)
    }

    pub fn operation(&self, name: &str) -> Option<&OperationModel> {
        self.operations.iter().find(|operation| operation.name == name)
    }

    /// Whether `parameter` may be supplied at client construction.
    pub fn is_client_context_param(&self, parameter: &str) -> bool {
        self.client_context_params
            .as_ref()
            .is_some_and(|params| params.contains(parameter))
    }
}

/// Endpoint rule set attached to a service.
///
/// Only the parameter catalog is interpreted here; the rules themselves belong to the
/// resolver and are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointRuleSet {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub parameters: ServiceParameterSet,
    #[serde(default)]
    pub rules: Value,
}

impl EndpointRuleSet {
    pub fn new(parameters: ServiceParameterSet) -> Self {
        Self {
            version: None,
            parameters,
            rules: Value::Null,
        }
    }
}

/// Parameters that may be configured once on the client and act as call-time defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientContextParams {
    params: IndexMap<String, ClientContextParam>,
}

impl ClientContextParams {
    pub fn new(params: IndexMap<String, ClientContextParam>) -> Self {
        Self { params }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ClientContextParam> {
        self.params.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }
}

impl FromIterator<(String, ClientContextParam)> for ClientContextParams {
    fn from_iter<I: IntoIterator<Item = (String, ClientContextParam)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContextParam {
    pub r#type: ParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

impl ClientContextParam {
    pub fn new(r#type: ParameterType) -> Self {
        Self {
            r#type,
            documentation: None,
        }
    }
}

/// A single operation of a service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationModel {
    pub name: String,
    #[serde(default)]
    pub input: Option<InputShape>,
    /// Literal parameter values fixed for this operation, keyed by parameter name.
    /// Values are raw JSON until checked against the declared parameter type.
    #[serde(default)]
    pub static_context_params: IndexMap<String, Value>,
}

impl OperationModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_input(mut self, input: InputShape) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_static_param(mut self, parameter: impl Into<String>, value: Value) -> Self {
        self.static_context_params.insert(parameter.into(), value);
        self
    }

    /// Input members that supply an endpoint parameter, as `(member, parameter)` pairs in
    /// member declaration order.
    pub fn context_bindings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.input
            .iter()
            .flat_map(|input| input.members.iter())
            .filter_map(|member| member.context_param.as_deref().map(|parameter| (member.name.as_str(), parameter)))
    }

    pub fn has_context_bindings(&self) -> bool {
        self.context_bindings().next().is_some()
    }
}

/// The input structure of an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    /// Shape name; the operation input supplied at call time must report the same name.
    pub name: String,
    #[serde(default)]
    pub members: Vec<InputMember>,
}

impl InputShape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn with_member(mut self, member: InputMember) -> Self {
        self.members.push(member);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputMember {
    pub name: String,
    /// Endpoint parameter this member supplies at call time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_param: Option<String>,
}

impl InputMember {
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context_param: None,
        }
    }

    pub fn bound(name: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context_param: Some(parameter.into()),
        }
    }
}

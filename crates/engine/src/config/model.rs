use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use waypoint_types::{ParameterType, ParameterValue, ServiceModel, ValueTypeError};

use crate::endpoint::EndpointResolver;

/// Client-context parameter values keyed by parameter name.
pub type ClientContextValues = IndexMap<String, ParameterValue>;

/// On-disk client settings.
///
/// `clientContext` holds values for the service's client context parameters and
/// `builtins` holds values for built-in identifiers such as `SDK::Region`. Values are
/// raw JSON until checked against a service by [`ClientOptions::from_settings`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClientSettings {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub client_context: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub builtins: IndexMap<String, Value>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("service '{service}' has no client context parameter named '{parameter}'")]
    UnknownClientContext { service: String, parameter: String },

    #[error("invalid value for '{parameter}': {cause}")]
    InvalidValue { parameter: String, cause: ValueTypeError },

    #[error("failed to read client settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse client settings as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse client settings as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Validated client options for one service client.
///
/// Holds the typed client-context values, the typed built-in values, and the endpoint
/// resolver the client was configured with (if any).
#[derive(Clone, Default)]
pub struct ClientOptions {
    client_context: ClientContextValues,
    builtins: IndexMap<String, ParameterValue>,
    endpoint_resolver: Option<Arc<dyn EndpointResolver>>,
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("client_context", &self.client_context)
            .field("builtins", &self.builtins)
            .field("has_endpoint_resolver", &self.endpoint_resolver.is_some())
            .finish()
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check raw settings against `service` and convert them into typed options.
    ///
    /// Client-context entries must name one of the service's client context parameters and
    /// carry a value of its type; `null` leaves the parameter unset. Built-in entries are
    /// type-checked against the catalog parameters that use the identifier. Identifiers the
    /// service never references are skipped.
    pub fn from_settings(service: &ServiceModel, settings: &ClientSettings) -> Result<Self, ConfigError> {
        let mut options = Self::new();

        for (name, raw) in &settings.client_context {
            let Some(declared) = service.client_context_params.as_ref().and_then(|params| params.get(name)) else {
                return Err(ConfigError::UnknownClientContext {
                    service: service.name.clone(),
                    parameter: name.clone(),
                });
            };
            if raw.is_null() {
                continue;
            }
            let parameter_type = service
                .parameters()
                .and_then(|catalog| catalog.get(name))
                .map_or(declared.r#type, |parameter| parameter.r#type);
            let value = typed_value(name, parameter_type, raw)?;
            options.client_context.insert(name.clone(), value);
        }

        for (identifier, raw) in &settings.builtins {
            let parameter_type = service.parameters().and_then(|catalog| {
                catalog
                    .built_ins()
                    .find(|parameter| parameter.built_in.as_deref() == Some(identifier.as_str()))
                    .map(|parameter| parameter.r#type)
            });
            let Some(parameter_type) = parameter_type else {
                debug!(service = %service.name, builtin = %identifier, "ignoring built-in value the service does not use");
                continue;
            };
            if raw.is_null() {
                continue;
            }
            let value = typed_value(identifier, parameter_type, raw)?;
            options.builtins.insert(identifier.clone(), value);
        }

        Ok(options)
    }

    pub fn with_client_context(mut self, parameter: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.client_context.insert(parameter.into(), value.into());
        self
    }

    pub fn with_builtin(mut self, identifier: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.builtins.insert(identifier.into(), value.into());
        self
    }

    pub fn with_endpoint_resolver(mut self, resolver: Arc<dyn EndpointResolver>) -> Self {
        self.endpoint_resolver = Some(resolver);
        self
    }

    pub fn client_context(&self) -> &ClientContextValues {
        &self.client_context
    }

    pub fn builtin(&self, identifier: &str) -> Option<&ParameterValue> {
        self.builtins.get(identifier)
    }

    pub fn builtins(&self) -> &IndexMap<String, ParameterValue> {
        &self.builtins
    }

    pub fn endpoint_resolver(&self) -> Option<&Arc<dyn EndpointResolver>> {
        self.endpoint_resolver.as_ref()
    }
}

fn typed_value(name: &str, parameter_type: ParameterType, raw: &Value) -> Result<ParameterValue, ConfigError> {
    ParameterValue::from_json(parameter_type, raw).map_err(|cause| ConfigError::InvalidValue {
        parameter: name.to_string(),
        cause,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use waypoint_types::{ClientContextParam, EndpointRuleSet, Parameter};

    fn storage_service() -> ServiceModel {
        ServiceModel {
            name: "Storage".into(),
            endpoint_rules: Some(EndpointRuleSet::new(
                vec![
                    Parameter::string("Region").with_built_in("SDK::Region"),
                    Parameter::boolean("UseFips").with_built_in("AWS::UseFIPS"),
                    Parameter::boolean("Accelerate"),
                ]
                .into_iter()
                .collect(),
            )),
            client_context_params: Some(
                [("Accelerate".to_string(), ClientContextParam::new(ParameterType::Boolean))]
                    .into_iter()
                    .collect(),
            ),
            operations: Vec::new(),
        }
    }

    #[test]
    fn settings_become_typed_options() {
        let settings: ClientSettings = serde_json::from_value(json!({
            "clientContext": { "Accelerate": true },
            "builtins": { "SDK::Region": "eu-west-1", "SDK::Unused": "x" }
        }))
        .expect("settings");

        let options = ClientOptions::from_settings(&storage_service(), &settings).expect("options");

        assert_eq!(options.client_context().get("Accelerate"), Some(&ParameterValue::Boolean(true)));
        assert_eq!(options.builtin("SDK::Region"), Some(&ParameterValue::String("eu-west-1".into())));
        assert!(options.builtin("SDK::Unused").is_none());
        assert!(options.endpoint_resolver().is_none());
    }

    #[test]
    fn unknown_client_context_is_rejected() {
        let settings = ClientSettings {
            client_context: [("Bucket".to_string(), json!("b"))].into_iter().collect(),
            ..Default::default()
        };
        let error = ClientOptions::from_settings(&storage_service(), &settings).unwrap_err();
        assert!(matches!(error, ConfigError::UnknownClientContext { ref parameter, .. } if parameter == "Bucket"));
    }

    #[test]
    fn mistyped_values_are_rejected() {
        let settings = ClientSettings {
            builtins: [("AWS::UseFIPS".to_string(), json!("yes"))].into_iter().collect(),
            ..Default::default()
        };
        let error = ClientOptions::from_settings(&storage_service(), &settings).unwrap_err();
        assert!(error.to_string().contains("AWS::UseFIPS"));
    }

    #[test]
    fn unknown_settings_fields_fail_to_parse() {
        let parsed: Result<ClientSettings, _> = serde_json::from_value(json!({ "region": "us-east-1" }));
        assert!(parsed.is_err());
    }
}

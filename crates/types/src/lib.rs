//! Shared model definitions for Waypoint endpoint resolution.
//!
//! The types here describe what a model provider hands to the binding engine: the
//! per-service parameter catalog, the client context declarations, and per-operation
//! input and static bindings. They are plain serde models and carry no behavior beyond
//! lookups and value encoding.

pub mod parameter;
pub mod service;

pub use parameter::{Parameter, ParameterType, ParameterValue, ServiceParameterSet, ValueTypeError, is_valid_parameter_name};
pub use service::{ClientContextParam, ClientContextParams, EndpointRuleSet, InputMember, InputShape, OperationModel, ServiceModel};

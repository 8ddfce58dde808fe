//! # Waypoint Engine
//!
//! The Waypoint Engine resolves, for every outbound service call, the endpoint the call
//! is sent to. Parameter values are merged from several independently declared sources
//! and handed to a pluggable [`EndpointResolver`]; the resulting [`Endpoint`] is then
//! applied to the serialized request inside the call's middleware stack.
//!
//! ## Precedence
//!
//! For every parameter the last source to write wins, in this fixed order:
//!
//! 1. built-in values from client or environment state,
//! 2. client context values configured once on the client,
//! 3. input members of the call,
//! 4. static constants declared on the operation.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use waypoint_engine::{
//!     ClientOptions, Endpoint, EndpointStageRegistrar, FixedEndpointResolver, MiddlewareStack, default_integrations,
//! };
//! use waypoint_types::{EndpointRuleSet, OperationModel, Parameter, ServiceModel};
//!
//! let service = Arc::new(ServiceModel {
//!     name: "Storage".into(),
//!     endpoint_rules: Some(EndpointRuleSet::new(vec![Parameter::string("Bucket")].into_iter().collect())),
//!     client_context_params: None,
//!     operations: vec![OperationModel::new("ListBuckets")],
//! });
//! let registrar = EndpointStageRegistrar::new(service, default_integrations())?;
//!
//! let resolver = FixedEndpointResolver::new(Endpoint::parse("https://storage.example.com")?);
//! let options = ClientOptions::new().with_endpoint_resolver(Arc::new(resolver));
//!
//! let mut stack = MiddlewareStack::new("ListBuckets");
//! # use waypoint_engine::{CallContext, Next, PipelineError, SerializeInput, SerializeMiddleware, SerializeOutput, Position};
//! # struct Legacy;
//! # #[async_trait::async_trait]
//! # impl SerializeMiddleware for Legacy {
//! #     fn id(&self) -> &str { "ResolveEndpoint" }
//! #     async fn handle_serialize(&self, c: &mut CallContext, i: SerializeInput, n: Next<'_>) -> Result<SerializeOutput, PipelineError> { n.run(c, i).await }
//! # }
//! # stack.serialize.add(Arc::new(Legacy), Position::Last)?;
//! registrar.register("ListBuckets", &mut stack, &options)?;
//! assert_eq!(stack.serialize.ids(), vec!["ResolveEndpoint", "ResolveEndpointV2"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`binding`**: compiles declarations into per-operation assignment programs
//! - **`record`**: the per-call resolved parameter record
//! - **`stage`**: the endpoint middleware stage
//! - **`registrar`**: attaches stages to middleware stacks
//! - **`pipeline`**: the serialize step of the middleware stack
//! - **`hooks`**, **`plugin`**, **`builtins`**: contributed capabilities
//! - **`config`**: client settings and options

pub mod binding;
pub mod builtins;
pub mod config;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod hooks;
pub mod input;
pub mod pipeline;
pub mod plugin;
pub mod record;
pub mod registrar;
pub mod stage;
pub mod transport;

// Re-export commonly used types for convenience
pub use binding::{AssignmentProgram, AssignmentStep, BindingOverlap, CompiledService, compile_service};
pub use builtins::{BuiltInHandler, BuiltInResolver, ClientSettingsBuiltIns, FixedBuiltIns};
pub use config::{
    CLIENT_CONFIG_PATH_ENV, ClientContextValues, ClientOptions, ClientSettings, ConfigError, default_settings_path, load_settings,
    load_settings_from_path, save_settings_to_path,
};
pub use context::{CallContext, Metadata};
pub use endpoint::{Endpoint, EndpointResolver, FixedEndpointResolver};
pub use error::{BindingError, BindingSourceKind, EndpointError, FailureKind, HookPhase, PipelineError, StackError};
pub use hooks::{HookRegistry, ResolutionHook};
pub use input::{JsonInput, OperationInput};
pub use pipeline::{
    MiddlewareStack, Next, Position, RelativePosition, SerializeHandler, SerializeInput, SerializeMiddleware, SerializeOutput, SerializeStep,
};
pub use plugin::{ClientSettingsIntegration, Integration, builtin_handlers, default_integrations};
pub use record::{Assignment, AssignmentSource, ResolvedParameters};
pub use registrar::EndpointStageRegistrar;
pub use stage::{ENDPOINT_STAGE_ID, EndpointStage, LEGACY_ENDPOINT_STAGE_ID, StageState};
pub use transport::{HttpTransmitter, TransportRequest, as_http_request};

//! Error types for endpoint binding and resolution.
//!
//! Failures are split by when they happen:
//! - [`BindingError`]: raised while compiling a service's declarations; aborts the service.
//! - [`EndpointError`]: raised by the endpoint stage during a single call; fatal to that call only.
//! - [`StackError`]: raised while assembling a middleware stack.
//! - [`PipelineError`]: what a caller observes when running a stack.

use thiserror::Error;
use waypoint_types::{ParameterType, ValueTypeError};

/// Declaration source that targets an endpoint parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingSourceKind {
    BuiltIn,
    ClientContext,
    InputContext,
    StaticContext,
}

impl std::fmt::Display for BindingSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingSourceKind::BuiltIn => f.write_str("built-in"),
            BindingSourceKind::ClientContext => f.write_str("client context"),
            BindingSourceKind::InputContext => f.write_str("input context"),
            BindingSourceKind::StaticContext => f.write_str("static context"),
        }
    }
}

/// Build-time failures. Any of these stops compilation for the whole service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    #[error("service '{service}' declares parameter '{parameter}' more than once")]
    DuplicateParameter { service: String, parameter: String },

    #[error("service '{service}' declares invalid parameter name '{parameter}'")]
    InvalidParameterName { service: String, parameter: String },

    #[error("{source_kind} binding in '{scope}' targets unknown parameter '{parameter}'")]
    UnknownParameter {
        scope: String,
        parameter: String,
        source_kind: BindingSourceKind,
    },

    #[error("{source_kind} binding in '{scope}' targets built-in parameter '{parameter}'")]
    BuiltInBinding {
        scope: String,
        parameter: String,
        source_kind: BindingSourceKind,
    },

    #[error("client context parameter '{parameter}' of service '{service}' is declared {declared}, but the endpoint parameter is {expected}")]
    ClientContextTypeMismatch {
        service: String,
        parameter: String,
        declared: ParameterType,
        expected: ParameterType,
    },

    #[error("unsupported static context param type for '{parameter}' on operation '{operation}': {cause}")]
    UnsupportedStaticType {
        operation: String,
        parameter: String,
        cause: ValueTypeError,
    },
}

/// Coarse classification of call-time failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Configuration,
    Resolver,
    Resolution,
    Hook,
    Canceled,
}

/// Which hook list a hook belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    PreResolution,
    PostResolution,
}

impl std::fmt::Display for HookPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookPhase::PreResolution => f.write_str("pre-resolution"),
            HookPhase::PostResolution => f.write_str("post-resolution"),
        }
    }
}

/// Call-time failures of the endpoint stage. None of these are retried.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("unknown transport type {observed}")]
    UnexpectedTransportType { observed: String },

    #[error("unknown input type {observed}, expected {expected}")]
    UnexpectedInputType { expected: String, observed: String },

    #[error("input member '{member}' cannot supply parameter '{parameter}': {cause}")]
    InvalidInputMember {
        member: String,
        parameter: String,
        cause: ValueTypeError,
    },

    #[error("{origin} value for parameter '{parameter}' is a {found}, expected {expected}")]
    MistypedValue {
        parameter: String,
        origin: BindingSourceKind,
        expected: ParameterType,
        found: ParameterType,
    },

    #[error("expected endpoint resolver to not be nil")]
    MissingResolver,

    #[error("failed to resolve service endpoint, {source}")]
    ResolutionFailed {
        #[source]
        source: anyhow::Error,
    },

    #[error("{phase} hook '{hook}' failed: {source}")]
    HookFailure {
        hook: String,
        phase: HookPhase,
        #[source]
        source: anyhow::Error,
    },

    #[error("endpoint resolution canceled")]
    Canceled,
}

impl EndpointError {
    pub fn unexpected_transport(observed: impl Into<String>) -> Self {
        Self::UnexpectedTransportType { observed: observed.into() }
    }

    pub fn unexpected_input(expected: impl Into<String>, observed: impl Into<String>) -> Self {
        Self::UnexpectedInputType {
            expected: expected.into(),
            observed: observed.into(),
        }
    }

    pub fn resolution_failed(source: anyhow::Error) -> Self {
        Self::ResolutionFailed { source }
    }

    pub fn hook_failure(hook: impl Into<String>, phase: HookPhase, source: anyhow::Error) -> Self {
        Self::HookFailure {
            hook: hook.into(),
            phase,
            source,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            EndpointError::UnexpectedTransportType { .. }
            | EndpointError::UnexpectedInputType { .. }
            | EndpointError::InvalidInputMember { .. } => FailureKind::Transport,
            EndpointError::MistypedValue { .. } => FailureKind::Configuration,
            EndpointError::MissingResolver => FailureKind::Resolver,
            EndpointError::ResolutionFailed { .. } => FailureKind::Resolution,
            EndpointError::HookFailure { .. } => FailureKind::Hook,
            EndpointError::Canceled => FailureKind::Canceled,
        }
    }
}

/// Failures while assembling a middleware stack.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("middleware '{0}' already exists in the serialize step")]
    DuplicateStage(String),

    #[error("anchor middleware '{0}' not found in the serialize step")]
    AnchorNotFound(String),

    #[error("operation '{operation}' is not part of service '{service}'")]
    UnknownOperation { service: String, operation: String },
}

/// Failures observed by whoever runs a middleware stack.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("middleware '{stage}' failed: {source}")]
    Middleware {
        stage: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("request handler failed: {0}")]
    Handler(#[source] anyhow::Error),
}

impl PipelineError {
    pub fn middleware(stage: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Middleware {
            stage: stage.into(),
            source,
        }
    }

    /// The endpoint stage failure carried by this error, if any.
    pub fn as_endpoint(&self) -> Option<&EndpointError> {
        match self {
            PipelineError::Endpoint(error) => Some(error),
            _ => None,
        }
    }
}

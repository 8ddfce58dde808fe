//! The endpoint resolution stage of the serialize step.
//!
//! One [`EndpointStage`] is built per operation and shared by every call of that
//! operation. Per call it validates the transport request and input, runs the
//! operation's assignment program, asks the resolver for an endpoint, and points the
//! request at it before handing control to the next stage. Any failure stops the call
//! and leaves the request untouched.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::debug;
use waypoint_types::ParameterValue;

use crate::{
    binding::AssignmentProgram,
    builtins::BuiltInResolver,
    config::{ClientContextValues, ClientOptions},
    context::CallContext,
    endpoint::{Endpoint, EndpointResolver},
    error::{EndpointError, PipelineError},
    hooks::HookRegistry,
    pipeline::{Next, SerializeInput, SerializeMiddleware, SerializeOutput},
    transport::as_http_request,
};

/// Identifier of the endpoint stage within the serialize step.
pub const ENDPOINT_STAGE_ID: &str = "ResolveEndpointV2";

/// Identifier of the stage the endpoint stage is inserted after.
pub const LEGACY_ENDPOINT_STAGE_ID: &str = "ResolveEndpoint";

/// Progress of a single call through the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Start,
    TransportValidated,
    InputValidated,
    ResolverChecked,
    BuiltinsApplied,
    ParamsBound,
    EndpointResolved,
    RequestMutated,
    Done,
    Failed,
}

pub struct EndpointStage {
    program: Arc<AssignmentProgram>,
    resolver: Option<Arc<dyn EndpointResolver>>,
    client_context: ClientContextValues,
    builtins: Vec<Arc<dyn BuiltInResolver>>,
    hooks: HookRegistry,
}

impl std::fmt::Debug for EndpointStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointStage")
            .field("operation", &self.program.operation())
            .field("has_resolver", &self.resolver.is_some())
            .field("client_context", &self.client_context)
            .field("builtins", &self.builtins.len())
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl EndpointStage {
    /// Capture the resolver and client-context values from `options`.
    pub fn new(program: Arc<AssignmentProgram>, options: &ClientOptions) -> Self {
        Self {
            program,
            resolver: options.endpoint_resolver().cloned(),
            client_context: options.client_context().clone(),
            builtins: Vec::new(),
            hooks: HookRegistry::default(),
        }
    }

    pub fn with_builtins(mut self, builtins: Vec<Arc<dyn BuiltInResolver>>) -> Self {
        self.builtins = builtins;
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn program(&self) -> &AssignmentProgram {
        &self.program
    }

    fn enter(&self, state: StageState) {
        debug!(operation = %self.program.operation(), state = ?state, "endpoint stage transition");
    }

    /// Everything up to and including the post-resolution hooks.
    async fn resolve(&self, context: &mut CallContext, input: &mut SerializeInput) -> Result<(), EndpointError> {
        self.enter(StageState::Start);
        let observed = input.request.type_name();
        let Some(request) = as_http_request(&mut *input.request) else {
            return Err(EndpointError::unexpected_transport(observed));
        };
        self.enter(StageState::TransportValidated);

        self.hooks.run_pre(context, request).await?;

        if let Some(expected) = self.program.input_shape() {
            let observed = input.parameters.shape_name();
            if observed != expected {
                return Err(EndpointError::unexpected_input(expected, observed));
            }
            self.enter(StageState::InputValidated);
        }

        let Some(resolver) = self.resolver.as_ref() else {
            return Err(EndpointError::MissingResolver);
        };
        self.enter(StageState::ResolverChecked);

        let builtins: Vec<IndexMap<String, ParameterValue>> = if self.program.has_builtins_step() {
            self.builtins.iter().map(|builtins| builtins.resolve_builtins(&*context)).collect()
        } else {
            Vec::new()
        };
        self.enter(StageState::BuiltinsApplied);

        let parameters = self.program.resolve(&builtins, &self.client_context, &*input.parameters)?;
        self.enter(StageState::ParamsBound);

        if context.is_canceled() {
            return Err(EndpointError::Canceled);
        }
        let cancellation = context.cancellation().clone();
        let endpoint: Endpoint = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(EndpointError::Canceled),
            resolved = resolver.resolve_endpoint(context, &parameters) => resolved.map_err(EndpointError::resolution_failed)?,
        };
        if context.is_canceled() {
            return Err(EndpointError::Canceled);
        }
        self.enter(StageState::EndpointResolved);

        endpoint.apply_to(request);
        debug!(operation = %self.program.operation(), url = %endpoint.uri, "applied resolved endpoint");
        self.enter(StageState::RequestMutated);

        self.hooks.run_post(context, request).await
    }
}

#[async_trait]
impl SerializeMiddleware for EndpointStage {
    fn id(&self) -> &str {
        ENDPOINT_STAGE_ID
    }

    async fn handle_serialize(
        &self,
        context: &mut CallContext,
        mut input: SerializeInput,
        next: Next<'_>,
    ) -> Result<SerializeOutput, PipelineError> {
        if let Err(error) = self.resolve(context, &mut input).await {
            debug!(
                operation = %self.program.operation(),
                state = ?StageState::Failed,
                kind = ?error.kind(),
                error = %error,
                "endpoint stage transition"
            );
            return Err(error.into());
        }
        self.enter(StageState::Done);
        next.run(context, input).await
    }
}

//! Attaches endpoint stages to operation middleware stacks.

use std::sync::Arc;

use tracing::debug;
use waypoint_types::ServiceModel;

use crate::{
    binding::{CompiledService, compile_service},
    builtins::BuiltInResolver,
    config::ClientOptions,
    error::{BindingError, StackError},
    hooks::HookRegistry,
    pipeline::{MiddlewareStack, RelativePosition},
    plugin::{Integration, builtin_handlers},
    stage::{EndpointStage, LEGACY_ENDPOINT_STAGE_ID},
};

/// Compiles a service once and builds endpoint stages for its operations.
pub struct EndpointStageRegistrar {
    service: Arc<ServiceModel>,
    integrations: Vec<Arc<dyn Integration>>,
    compiled: CompiledService,
}

impl std::fmt::Debug for EndpointStageRegistrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let integrations: Vec<&str> = self.integrations.iter().map(|integration| integration.name()).collect();
        f.debug_struct("EndpointStageRegistrar")
            .field("service", &self.service.name)
            .field("integrations", &integrations)
            .field("operations", &self.compiled.programs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EndpointStageRegistrar {
    pub fn new(service: Arc<ServiceModel>, integrations: Vec<Arc<dyn Integration>>) -> Result<Self, BindingError> {
        let compiled = compile_service(&service, &integrations)?;
        Ok(Self {
            service,
            integrations,
            compiled,
        })
    }

    pub fn compiled(&self) -> &CompiledService {
        &self.compiled
    }

    /// Build the stage for `operation`.
    ///
    /// Returns `Ok(None)` when the service has no endpoint rules.
    pub fn build_stage(&self, operation: &str, options: &ClientOptions) -> Result<Option<EndpointStage>, StackError> {
        let Some(model) = self.service.operation(operation) else {
            return Err(StackError::UnknownOperation {
                service: self.service.name.clone(),
                operation: operation.to_string(),
            });
        };
        let Some(program) = self.compiled.program(operation) else {
            return Ok(None);
        };

        let builtins: Vec<Arc<dyn BuiltInResolver>> = if program.has_builtins_step() {
            builtin_handlers(&self.integrations)
                .iter()
                .map(|handler| handler.initialize(program.parameters(), options))
                .collect()
        } else {
            Vec::new()
        };
        let hooks = HookRegistry::for_operation(&self.integrations, options, &self.service, model);

        Ok(Some(
            EndpointStage::new(Arc::clone(program), options)
                .with_builtins(builtins)
                .with_hooks(hooks),
        ))
    }

    /// Insert the endpoint stage for `operation` directly after the legacy endpoint stage.
    ///
    /// Returns whether a stage was attached. Registering the same operation twice on one
    /// stack fails with the stack's duplicate-stage error.
    pub fn register(&self, operation: &str, stack: &mut MiddlewareStack, options: &ClientOptions) -> Result<bool, StackError> {
        let Some(stage) = self.build_stage(operation, options)? else {
            debug!(service = %self.service.name, operation = %operation, "no endpoint rules, endpoint stage not attached");
            return Ok(false);
        };
        stack
            .serialize
            .insert(Arc::new(stage), LEGACY_ENDPOINT_STAGE_ID, RelativePosition::After)?;
        debug!(service = %self.service.name, operation = %operation, "attached endpoint stage");
        Ok(true)
    }
}

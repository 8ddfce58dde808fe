//! Pre- and post-resolution hooks.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use waypoint_types::{OperationModel, ServiceModel};

use crate::{
    config::ClientOptions,
    context::CallContext,
    error::{EndpointError, HookPhase},
    plugin::Integration,
};

/// Callback run by the endpoint stage around resolution.
///
/// Pre-resolution hooks see the request right after its transport kind was validated;
/// post-resolution hooks see it right after the endpoint was applied. Any error stops
/// the call.
#[async_trait]
pub trait ResolutionHook: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, context: &mut CallContext, request: &mut reqwest::Request) -> anyhow::Result<()>;
}

/// Ordered hook lists for one operation.
#[derive(Clone, Default)]
pub struct HookRegistry {
    pre: Vec<Arc<dyn ResolutionHook>>,
    post: Vec<Arc<dyn ResolutionHook>>,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |hooks: &[Arc<dyn ResolutionHook>]| hooks.iter().map(|hook| hook.name().to_string()).collect::<Vec<_>>();
        f.debug_struct("HookRegistry")
            .field("pre", &names(&self.pre))
            .field("post", &names(&self.post))
            .finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the hooks the integrations contribute for `operation`, in integration order.
    pub fn for_operation(
        integrations: &[Arc<dyn Integration>],
        options: &ClientOptions,
        service: &ServiceModel,
        operation: &OperationModel,
    ) -> Self {
        let mut registry = Self::new();
        for integration in integrations {
            if let Some(hook) = integration.pre_resolution_hook(options, service) {
                registry.push_pre(hook);
            }
            if let Some(hook) = integration.post_resolution_hook(options, service, operation) {
                registry.push_post(hook);
            }
        }
        debug!(
            service = %service.name,
            operation = %operation.name,
            pre = registry.pre.len(),
            post = registry.post.len(),
            "collected resolution hooks"
        );
        registry
    }

    pub fn push_pre(&mut self, hook: Arc<dyn ResolutionHook>) {
        self.pre.push(hook);
    }

    pub fn push_post(&mut self, hook: Arc<dyn ResolutionHook>) {
        self.post.push(hook);
    }

    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty()
    }

    pub async fn run_pre(&self, context: &mut CallContext, request: &mut reqwest::Request) -> Result<(), EndpointError> {
        run_all(&self.pre, HookPhase::PreResolution, context, request).await
    }

    pub async fn run_post(&self, context: &mut CallContext, request: &mut reqwest::Request) -> Result<(), EndpointError> {
        run_all(&self.post, HookPhase::PostResolution, context, request).await
    }
}

async fn run_all(
    hooks: &[Arc<dyn ResolutionHook>],
    phase: HookPhase,
    context: &mut CallContext,
    request: &mut reqwest::Request,
) -> Result<(), EndpointError> {
    for hook in hooks {
        debug!(hook = %hook.name(), %phase, "running resolution hook");
        hook.run(context, request)
            .await
            .map_err(|source| EndpointError::hook_failure(hook.name(), phase, source))?;
    }
    Ok(())
}

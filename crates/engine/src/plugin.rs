//! Integrations contributing optional capabilities to endpoint resolution.
//!
//! The integration list of a client is passed explicitly to the binding compiler and
//! the registrar. Each integration is asked for each capability and may decline by
//! returning `None`.

use std::sync::Arc;

use waypoint_types::{OperationModel, ServiceModel};

use crate::{
    builtins::{BuiltInHandler, ClientSettingsBuiltIns},
    config::ClientOptions,
    hooks::ResolutionHook,
};

pub trait Integration: Send + Sync {
    fn name(&self) -> &str;

    fn builtin_handler(&self) -> Option<Arc<dyn BuiltInHandler>> {
        None
    }

    fn pre_resolution_hook(&self, _options: &ClientOptions, _service: &ServiceModel) -> Option<Arc<dyn ResolutionHook>> {
        None
    }

    fn post_resolution_hook(
        &self,
        _options: &ClientOptions,
        _service: &ServiceModel,
        _operation: &OperationModel,
    ) -> Option<Arc<dyn ResolutionHook>> {
        None
    }
}

/// Supplies built-in values from the client settings file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientSettingsIntegration;

impl Integration for ClientSettingsIntegration {
    fn name(&self) -> &str {
        "client-settings"
    }

    fn builtin_handler(&self) -> Option<Arc<dyn BuiltInHandler>> {
        Some(Arc::new(ClientSettingsBuiltIns))
    }
}

/// The integrations a client gets when none are configured.
pub fn default_integrations() -> Vec<Arc<dyn Integration>> {
    vec![Arc::new(ClientSettingsIntegration)]
}

/// Built-in handlers of `integrations`, in order.
pub fn builtin_handlers(integrations: &[Arc<dyn Integration>]) -> Vec<Arc<dyn BuiltInHandler>> {
    integrations.iter().filter_map(|integration| integration.builtin_handler()).collect()
}

//! Built-in parameter handlers.
//!
//! Built-in parameters take their values from client or environment state rather than
//! from the call. A [`BuiltInHandler`] is asked once, when the endpoint stage for an
//! operation is constructed, to capture whatever client state it needs; the
//! [`BuiltInResolver`] it returns is held by the stage and invoked once per call to
//! produce every built-in value together.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;
use waypoint_types::{ParameterValue, ServiceParameterSet};

use crate::{config::ClientOptions, context::CallContext};

/// Contributes values for built-in parameters.
pub trait BuiltInHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Capture client state for the given catalog.
    fn initialize(&self, parameters: &ServiceParameterSet, options: &ClientOptions) -> Arc<dyn BuiltInResolver>;
}

/// Per-stage built-in value source.
pub trait BuiltInResolver: Send + Sync {
    /// Values keyed by parameter name. Parameters left out stay unset.
    fn resolve_builtins(&self, context: &CallContext) -> IndexMap<String, ParameterValue>;
}

/// Maps every built-in parameter to the value configured for its identifier in
/// [`ClientOptions::builtins`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientSettingsBuiltIns;

impl BuiltInHandler for ClientSettingsBuiltIns {
    fn name(&self) -> &str {
        "client-settings"
    }

    fn initialize(&self, parameters: &ServiceParameterSet, options: &ClientOptions) -> Arc<dyn BuiltInResolver> {
        let values: IndexMap<String, ParameterValue> = parameters
            .built_ins()
            .filter_map(|parameter| {
                let identifier = parameter.built_in.as_deref()?;
                let value = options.builtin(identifier)?;
                Some((parameter.name.clone(), value.clone()))
            })
            .collect();
        debug!(handler = self.name(), count = values.len(), "captured built-in values");
        Arc::new(FixedBuiltIns { values })
    }
}

/// Resolver returning a fixed set of values on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedBuiltIns {
    values: IndexMap<String, ParameterValue>,
}

impl FixedBuiltIns {
    pub fn new(values: IndexMap<String, ParameterValue>) -> Self {
        Self { values }
    }
}

impl BuiltInResolver for FixedBuiltIns {
    fn resolve_builtins(&self, _context: &CallContext) -> IndexMap<String, ParameterValue> {
        self.values.clone()
    }
}

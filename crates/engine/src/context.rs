//! Per-call context threaded through the middleware stack.

use indexmap::IndexMap;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Call-scoped state: the operation being invoked, its cancellation signal, and metadata
/// that middleware and hooks may read or annotate.
///
/// A context is created for exactly one call and never shared between calls.
#[derive(Debug, Clone)]
pub struct CallContext {
    operation: String,
    cancellation: CancellationToken,
    metadata: Metadata,
}

impl CallContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self::with_cancellation(operation, CancellationToken::new())
    }

    /// Create a context bound to the caller's cancellation token.
    pub fn with_cancellation(operation: impl Into<String>, cancellation: CancellationToken) -> Self {
        Self {
            operation: operation.into(),
            cancellation,
            metadata: Metadata::default(),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_canceled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Ordered string-keyed annotations attached to a call or its output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: IndexMap<String, Value>,
}

impl Metadata {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

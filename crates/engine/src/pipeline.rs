//! Ordered middleware stack for outbound calls.
//!
//! Only the serialize step is modeled: the phase in which the operation input has been
//! turned into a transport request that has not yet been sent. Middleware is held in
//! an ordered list of uniquely named stages and can be inserted relative to another stage,
//! so a stage added after `X` observes the request exactly as `X` left it.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    context::{CallContext, Metadata},
    error::{PipelineError, StackError},
    input::OperationInput,
    transport::TransportRequest,
};

/// The in-flight call as seen by serialize middleware.
pub struct SerializeInput {
    pub request: Box<dyn TransportRequest>,
    /// The caller-supplied operation input.
    pub parameters: Box<dyn OperationInput>,
}

impl SerializeInput {
    pub fn new(request: impl TransportRequest, parameters: impl OperationInput) -> Self {
        Self {
            request: Box::new(request),
            parameters: Box::new(parameters),
        }
    }
}

/// Result of running the serialize step and everything after it.
#[derive(Default)]
pub struct SerializeOutput {
    /// Transport response produced by the terminal handler, if any.
    pub result: Option<Box<dyn Any + Send>>,
    pub metadata: Metadata,
}

impl std::fmt::Debug for SerializeOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializeOutput")
            .field("has_result", &self.result.is_some())
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// A named stage of the serialize step.
#[async_trait]
pub trait SerializeMiddleware: Send + Sync {
    /// Identifier, unique within a step.
    fn id(&self) -> &str;

    /// Process the call and either fail or pass control on through `next`.
    async fn handle_serialize(
        &self,
        context: &mut CallContext,
        input: SerializeInput,
        next: Next<'_>,
    ) -> Result<SerializeOutput, PipelineError>;
}

/// What runs after the last stage, typically the transmitter.
#[async_trait]
pub trait SerializeHandler: Send + Sync {
    async fn handle(&self, context: &mut CallContext, input: SerializeInput) -> Result<SerializeOutput, PipelineError>;
}

/// The remainder of the chain after the current stage.
pub struct Next<'a> {
    stages: &'a [Arc<dyn SerializeMiddleware>],
    handler: &'a dyn SerializeHandler,
}

impl<'a> Next<'a> {
    pub fn new(stages: &'a [Arc<dyn SerializeMiddleware>], handler: &'a dyn SerializeHandler) -> Self {
        Self { stages, handler }
    }

    pub async fn run(self, context: &mut CallContext, input: SerializeInput) -> Result<SerializeOutput, PipelineError> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.handle_serialize(context, input, Next::new(rest, self.handler)).await,
            None => self.handler.handle(context, input).await,
        }
    }
}

/// Where to add a stage in absolute terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    First,
    Last,
}

/// Where to add a stage relative to an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativePosition {
    Before,
    After,
}

/// Ordered list of uniquely identified serialize middleware.
#[derive(Default, Clone)]
pub struct SerializeStep {
    stages: Vec<Arc<dyn SerializeMiddleware>>,
}

impl std::fmt::Debug for SerializeStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializeStep").field("stages", &self.ids()).finish()
    }
}

impl SerializeStep {
    pub fn add(&mut self, stage: Arc<dyn SerializeMiddleware>, position: Position) -> Result<(), StackError> {
        self.ensure_unique(stage.id())?;
        debug!(stage = %stage.id(), ?position, "adding serialize middleware");
        match position {
            Position::First => self.stages.insert(0, stage),
            Position::Last => self.stages.push(stage),
        }
        Ok(())
    }

    /// Insert `stage` directly before or after the stage identified by `anchor`.
    pub fn insert(&mut self, stage: Arc<dyn SerializeMiddleware>, anchor: &str, position: RelativePosition) -> Result<(), StackError> {
        self.ensure_unique(stage.id())?;
        let anchor_index = self
            .index_of(anchor)
            .ok_or_else(|| StackError::AnchorNotFound(anchor.to_string()))?;
        let insert_index = match position {
            RelativePosition::Before => anchor_index,
            RelativePosition::After => anchor_index + 1,
        };
        debug!(stage = %stage.id(), anchor = %anchor, ?position, "inserting serialize middleware");
        self.stages.insert(insert_index, stage);
        Ok(())
    }

    /// Remove a stage by identifier, returning it if present.
    pub fn remove(&mut self, id: &str) -> Option<Arc<dyn SerializeMiddleware>> {
        let index = self.index_of(id)?;
        Some(self.stages.remove(index))
    }

    pub fn ids(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.id()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_of(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run the call through every stage in order and finally through `handler`.
    pub async fn handle(
        &self,
        context: &mut CallContext,
        input: SerializeInput,
        handler: &dyn SerializeHandler,
    ) -> Result<SerializeOutput, PipelineError> {
        Next::new(&self.stages, handler).run(context, input).await
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.stages.iter().position(|stage| stage.id() == id)
    }

    fn ensure_unique(&self, id: &str) -> Result<(), StackError> {
        if self.contains(id) {
            return Err(StackError::DuplicateStage(id.to_string()));
        }
        Ok(())
    }
}

/// Middleware stack of one operation.
#[derive(Debug, Default, Clone)]
pub struct MiddlewareStack {
    operation: String,
    pub serialize: SerializeStep,
}

impl MiddlewareStack {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            serialize: SerializeStep::default(),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Run a call through the stack.
    pub async fn handle(
        &self,
        context: &mut CallContext,
        input: SerializeInput,
        handler: &dyn SerializeHandler,
    ) -> Result<SerializeOutput, PipelineError> {
        self.serialize.handle(context, input, handler).await
    }
}

//! Transport requests carried through the serialize step and the HTTP terminal handler.

use std::any::Any;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::{
    context::CallContext,
    error::{EndpointError, PipelineError},
    pipeline::{SerializeHandler, SerializeInput, SerializeOutput},
};

/// An in-flight request of some transport kind.
///
/// The middleware stack is transport-agnostic; stages that need a concrete transport
/// downcast to it and report [`TransportRequest::type_name`] when the kind is wrong.
pub trait TransportRequest: Any + Send {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl TransportRequest for reqwest::Request {}

/// Borrow the request as HTTP, if that is what it is.
pub fn as_http_request(request: &mut dyn TransportRequest) -> Option<&mut reqwest::Request> {
    let request: &mut dyn Any = request;
    request.downcast_mut::<reqwest::Request>()
}

/// Terminal handler that sends the serialized HTTP request.
#[derive(Debug, Clone, Default)]
pub struct HttpTransmitter {
    client: Client,
}

impl HttpTransmitter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SerializeHandler for HttpTransmitter {
    async fn handle(&self, context: &mut CallContext, input: SerializeInput) -> Result<SerializeOutput, PipelineError> {
        let observed = input.request.type_name();
        let request: Box<dyn Any> = input.request;
        let request = request
            .downcast::<reqwest::Request>()
            .map_err(|_| EndpointError::unexpected_transport(observed))?;

        debug!(
            operation = %context.operation(),
            method = %request.method(),
            url = %request.url(),
            "transmitting request"
        );
        let cancellation = context.cancellation().clone();
        let response = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(EndpointError::Canceled.into()),
            response = self.client.execute(*request) => response.map_err(|error| PipelineError::Handler(error.into()))?,
        };

        let mut output = SerializeOutput::default();
        output.metadata.set("http.status", response.status().as_u16());
        output.result = Some(Box::new(response));
        Ok(output)
    }
}

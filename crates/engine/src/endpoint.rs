//! Resolved endpoints and the resolver capability that produces them.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::{context::CallContext, record::ResolvedParameters};

/// Network target for a single call.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub uri: Url,
    /// Header values to place on the request. A name present here replaces every value the
    /// request already carries for that name.
    pub headers: HeaderMap,
}

impl Endpoint {
    pub fn new(uri: Url) -> Self {
        Self {
            uri,
            headers: HeaderMap::new(),
        }
    }

    pub fn parse(uri: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(uri)?))
    }

    /// Append a header value; repeated names accumulate.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Point `request` at this endpoint.
    ///
    /// The URL is replaced outright. For each header name carried by the endpoint, the
    /// request's existing values are removed before the endpoint's values are appended;
    /// names the endpoint does not mention are left alone.
    pub fn apply_to(&self, request: &mut reqwest::Request) {
        *request.url_mut() = self.uri.clone();

        let request_headers = request.headers_mut();
        for name in self.headers.keys() {
            request_headers.remove(name);
            for value in self.headers.get_all(name) {
                request_headers.append(name.clone(), value.clone());
            }
        }
    }
}

/// Pluggable endpoint resolution, e.g. a rules engine evaluating region tables.
///
/// Implementations may suspend (I/O, cache lookups). They are shared across concurrent
/// calls and must not rely on per-call mutable state.
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    async fn resolve_endpoint(&self, context: &CallContext, parameters: &ResolvedParameters) -> anyhow::Result<Endpoint>;
}

/// Resolver that ignores the parameters and always returns the same endpoint, for clients
/// pinned to a fixed address.
#[derive(Debug, Clone)]
pub struct FixedEndpointResolver {
    endpoint: Endpoint,
}

impl FixedEndpointResolver {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl EndpointResolver for FixedEndpointResolver {
    async fn resolve_endpoint(&self, _context: &CallContext, _parameters: &ResolvedParameters) -> anyhow::Result<Endpoint> {
        Ok(self.endpoint.clone())
    }
}

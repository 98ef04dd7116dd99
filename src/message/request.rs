//! Neutral inbound request.

use super::{Headers, QueryParams, SessionContext};
use crate::buffer::BufferHandle;
use crate::stream::{BodyStream, ReplayStream, StreamError};

/// Request line, headers and connection details of a request.
///
/// Also used as the snapshot of the inbound original, since downstream code
/// may rewrite headers and query parameters of the live request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParts {
    /// Protocol version text, e.g. `HTTP/1.1`.
    pub protocol: String,
    /// Lowercase method name.
    pub method: String,
    /// Raw request URI as received, including the query string.
    pub uri: String,
    pub query: QueryParams,
    pub headers: Headers,
    /// Textual client IP; empty when it could not be determined.
    pub client_ip: String,
    pub scheme: String,
    pub port: u16,
    pub server_name: String,
}

/// A request in the gateway's neutral model, with a lazily consumed body.
#[derive(Debug)]
pub struct NeutralRequest {
    context: SessionContext,
    parts: RequestParts,
    inbound: Option<RequestParts>,
    body: ReplayStream<BufferHandle>,
}

impl NeutralRequest {
    pub fn new(context: SessionContext, parts: RequestParts, body: ReplayStream<BufferHandle>) -> Self {
        Self {
            context,
            parts,
            inbound: None,
            body,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn protocol(&self) -> &str {
        &self.parts.protocol
    }

    pub fn method(&self) -> &str {
        &self.parts.method
    }

    pub fn uri(&self) -> &str {
        &self.parts.uri
    }

    /// Path portion of the URI.
    pub fn path(&self) -> &str {
        let uri = self.parts.uri.as_str();
        uri.split_once('?').map_or(uri, |(path, _)| path)
    }

    pub fn query(&self) -> &QueryParams {
        &self.parts.query
    }

    pub fn query_mut(&mut self) -> &mut QueryParams {
        &mut self.parts.query
    }

    pub fn headers(&self) -> &Headers {
        &self.parts.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.parts.headers
    }

    pub fn client_ip(&self) -> &str {
        &self.parts.client_ip
    }

    pub fn scheme(&self) -> &str {
        &self.parts.scheme
    }

    pub fn port(&self) -> u16 {
        self.parts.port
    }

    pub fn server_name(&self) -> &str {
        &self.parts.server_name
    }

    /// Record the current request as the inbound original.
    pub fn store_inbound(&mut self) {
        self.inbound = Some(self.parts.clone());
    }

    /// The request as it was received, if `store_inbound` ran.
    pub fn inbound(&self) -> Option<&RequestParts> {
        self.inbound.as_ref()
    }

    pub fn body(&self) -> &ReplayStream<BufferHandle> {
        &self.body
    }

    /// Attach the single pull consumer of the body.
    pub fn body_stream(&self) -> Result<BodyStream<BufferHandle>, StreamError> {
        self.body.subscribe()
    }

    pub fn into_body(self) -> ReplayStream<BufferHandle> {
        self.body
    }
}

//! Neutral outbound response.

use bytes::Bytes;
use futures_util::{stream, Stream};
use std::fmt;
use std::pin::Pin;

use super::Headers;
use crate::buffer::BufferHandle;
use crate::stream::StreamError;

/// Boxed response body stream.
pub type ResponseBody = Pin<Box<dyn Stream<Item = Result<BufferHandle, StreamError>> + Send>>;

/// A response in the gateway's neutral model.
pub struct NeutralResponse {
    status: u16,
    headers: Headers,
    body: Option<ResponseBody>,
}

impl NeutralResponse {
    /// An empty-bodied response.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body<S>(mut self, body: S) -> Self
    where
        S: Stream<Item = Result<BufferHandle, StreamError>> + Send + 'static,
    {
        self.body = Some(Box::pin(body));
        self
    }

    /// Single-chunk body.
    pub fn with_bytes(self, bytes: impl Into<Bytes>) -> Self {
        let chunk = BufferHandle::new(bytes);
        self.with_body(stream::once(async move { Ok(chunk) }))
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub fn take_body(&mut self) -> Option<ResponseBody> {
        self.body.take()
    }
}

impl fmt::Debug for NeutralResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NeutralResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

//! Contracts consumed from the native HTTP layer.

use std::borrow::Cow;
use std::future::Future;

use crate::buffer::BufferHandle;
use crate::error::AdapterResult;
use crate::net::NativeChannel;
use crate::stream::{BoxError, ReplayProducer, StreamError};

/// An inbound request as produced by the native server library.
pub trait NativeRequest {
    fn method(&self) -> &str;

    /// Protocol version text, e.g. `HTTP/1.1`.
    fn http_version(&self) -> &str;

    /// Raw request URI including any query string.
    fn uri(&self) -> &str;

    /// Every header entry. Values for one name keep their wire order; entries
    /// of different names may come grouped by name, as `http::HeaderMap` yields them.
    fn headers(&self) -> impl Iterator<Item = (&str, Cow<'_, str>)>;

    /// Query parameters grouped by name, in the native map's iteration order.
    fn query_parameters(&self) -> Vec<(String, Vec<String>)>;

    fn channel(&self) -> Option<&dyn NativeChannel>;

    /// Start pushing body chunks into `sink`. Called at most once per request.
    fn subscribe_content(&mut self, sink: ContentSink);
}

/// A native response writer.
pub trait NativeResponse: Send {
    fn set_status(&mut self, status: u16);

    fn add_header(&mut self, name: &str, value: &str);

    /// Write one chunk and wait until the transport has accepted it.
    /// The writer owns the chunk and releases it once written.
    fn write_bytes_and_flush(
        &mut self,
        chunk: BufferHandle,
    ) -> impl Future<Output = AdapterResult<()>> + Send;

    fn close(&mut self);
}

/// Where the native layer pushes request content.
///
/// Each chunk is retained before it enters the body stream, so the native
/// layer keeps ownership of (and must release) the handle it passes in.
#[derive(Debug)]
pub struct ContentSink {
    producer: ReplayProducer<BufferHandle>,
}

impl ContentSink {
    pub fn new(producer: ReplayProducer<BufferHandle>) -> Self {
        Self { producer }
    }

    /// Transfer one chunk into the body stream.
    pub fn on_next(&self, chunk: &BufferHandle) -> Result<(), StreamError> {
        self.producer.push(chunk.retain())
    }

    pub fn on_complete(self) {
        if let Err(err) = self.producer.complete() {
            tracing::debug!(error = %err, "Content completed after body stream terminated");
        }
    }

    pub fn on_error(self, error: impl Into<BoxError>) {
        if let Err(err) = self.producer.fail(error) {
            tracing::debug!(error = %err, "Content failed after body stream terminated");
        }
    }
}

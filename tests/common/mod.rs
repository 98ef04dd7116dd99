//! Shared mocks for the session and server integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use std::borrow::Cow;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use gateway_bridge::buffer::{BufferHandle, BufferLedger};
use gateway_bridge::error::{AdapterError, AdapterResult};
use gateway_bridge::net::{ConnectionAddresses, NativeChannel, SocketAddress};
use gateway_bridge::session::{ContentSink, NativeRequest, NativeResponse};
use gateway_bridge::stream::{BoxError, StreamError, Subscriber};

pub fn inet(addr: &str) -> SocketAddress {
    addr.parse::<SocketAddr>().unwrap().into()
}

/// Local 10.0.0.1:8080, remote 192.168.1.5:50000.
pub fn tcp_channel() -> ConnectionAddresses {
    ConnectionAddresses {
        local: Some(inet("10.0.0.1:8080")),
        remote: Some(inet("192.168.1.5:50000")),
    }
}

/// A scripted network request. Body content is pushed by the test after ingress.
pub struct MockRequest {
    pub method: String,
    pub version: String,
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, Vec<String>)>,
    pub channel: Option<ConnectionAddresses>,
    pub ledger: Arc<BufferLedger>,
    sink: Option<ContentSink>,
    subscriptions: usize,
}

impl MockRequest {
    pub fn new(method: &str, uri: &str) -> Self {
        Self {
            method: method.to_string(),
            version: "HTTP/1.1".to_string(),
            uri: uri.to_string(),
            headers: Vec::new(),
            query: Vec::new(),
            channel: Some(tcp_channel()),
            ledger: BufferLedger::new(),
            sink: None,
            subscriptions: 0,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn query_param(mut self, name: &str, values: &[&str]) -> Self {
        self.query.push((
            name.to_string(),
            values.iter().map(|value| value.to_string()).collect(),
        ));
        self
    }

    pub fn channel(mut self, channel: Option<ConnectionAddresses>) -> Self {
        self.channel = channel;
        self
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions
    }

    /// Deliver one chunk the way the network does: allocate, hand over, release own handle.
    pub fn push(&self, data: &'static str) -> Result<(), StreamError> {
        let chunk = BufferHandle::tracked(data, &self.ledger);
        let sink = self.sink.as_ref().expect("content not subscribed");
        let outcome = sink.on_next(&chunk);
        chunk.release();
        outcome
    }

    pub fn complete(&mut self) {
        self.sink.take().expect("content not subscribed").on_complete();
    }

    pub fn fail(&mut self, message: &str) {
        let error: BoxError = message.to_string().into();
        self.sink.take().expect("content not subscribed").on_error(error);
    }
}

impl NativeRequest for MockRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn http_version(&self) -> &str {
        &self.version
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn headers(&self) -> impl Iterator<Item = (&str, Cow<'_, str>)> {
        self.headers
            .iter()
            .map(|(name, value)| (name.as_str(), Cow::Borrowed(value.as_str())))
    }

    fn query_parameters(&self) -> Vec<(String, Vec<String>)> {
        self.query.clone()
    }

    fn channel(&self) -> Option<&dyn NativeChannel> {
        self.channel.as_ref().map(|channel| channel as &dyn NativeChannel)
    }

    fn subscribe_content(&mut self, sink: ContentSink) {
        self.subscriptions += 1;
        self.sink = Some(sink);
    }
}

/// One call made on a [`RecordingWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterCall {
    Status(u16),
    Header(String, String),
    Write(Bytes),
    Close,
}

/// Records every call; can be told to fail or stall writes.
#[derive(Debug, Default)]
pub struct RecordingWriter {
    pub calls: Vec<WriterCall>,
    /// Writes succeed this many times, then fail with `WriterClosed`.
    pub fail_after: Option<usize>,
    /// Writes never complete.
    pub stall: bool,
    writes: usize,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(writes: usize) -> Self {
        Self {
            fail_after: Some(writes),
            ..Self::default()
        }
    }

    pub fn stalling() -> Self {
        Self {
            stall: true,
            ..Self::default()
        }
    }

    pub fn closes(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| **call == WriterCall::Close)
            .count()
    }

    pub fn writes(&self) -> Vec<Bytes> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                WriterCall::Write(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }
}

impl NativeResponse for RecordingWriter {
    fn set_status(&mut self, status: u16) {
        self.calls.push(WriterCall::Status(status));
    }

    fn add_header(&mut self, name: &str, value: &str) {
        self.calls
            .push(WriterCall::Header(name.to_string(), value.to_string()));
    }

    fn write_bytes_and_flush(
        &mut self,
        chunk: BufferHandle,
    ) -> impl Future<Output = AdapterResult<()>> + Send {
        async move {
            if self.stall {
                std::future::pending::<()>().await;
            }
            if self.fail_after == Some(self.writes) {
                return Err(AdapterError::WriterClosed);
            }
            self.writes += 1;
            self.calls.push(WriterCall::Write(chunk.to_bytes()));
            Ok(())
        }
    }

    fn close(&mut self) {
        self.calls.push(WriterCall::Close);
    }
}

/// What a [`Recorder`] has seen.
#[derive(Debug, Default)]
pub struct Record {
    pub items: Vec<Bytes>,
    pub completed: bool,
    pub error: Option<String>,
}

/// Push subscriber that copies and releases each chunk.
pub struct Recorder(pub Arc<Mutex<Record>>);

impl Recorder {
    pub fn new() -> (Self, Arc<Mutex<Record>>) {
        let record = Arc::new(Mutex::new(Record::default()));
        (Self(Arc::clone(&record)), record)
    }
}

impl Subscriber<BufferHandle> for Recorder {
    fn on_next(&mut self, item: BufferHandle) -> Result<(), BoxError> {
        self.0.lock().unwrap().items.push(item.to_bytes());
        Ok(())
    }

    fn on_complete(&mut self) {
        self.0.lock().unwrap().completed = true;
    }

    fn on_error(&mut self, error: StreamError) {
        self.0.lock().unwrap().error = Some(error.to_string());
    }
}

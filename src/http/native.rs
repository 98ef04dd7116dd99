//! axum request and response types behind the native contracts.
//!
//! # Responsibilities
//! - Expose an axum request (plus its connection addresses) as a `NativeRequest`
//! - Pump the hyper body into the session's `ContentSink`
//! - Turn `NativeResponse` calls into a streamed axum response
//!
//! # Data Flow
//! ```text
//! Request<Body> ──subscribe_content──▶ spawned pump ──▶ ContentSink
//!
//! set_status/add_header ─┐
//! first write or close ──┴──▶ head (oneshot) ──▶ handler returns Response
//! write_bytes_and_flush ─────▶ mpsc(1) ──▶ Body::from_stream
//! ```
//!
//! # Design Decisions
//! - The response head is committed lazily, on first write or close
//! - An unrepresentable status commits a bodiless 500 and fails every body write with `InvalidStatus`
//! - A one-slot channel makes each write wait for the transport to take the previous chunk
//! - Header values carrying obs-text bytes are decoded as latin-1, never dropped

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, Response, StatusCode, Version};
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use std::borrow::Cow;
use std::convert::Infallible;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};

use crate::buffer::BufferHandle;
use crate::error::{AdapterError, AdapterResult};
use crate::net::{ConnectionAddresses, NativeChannel};
use crate::session::{ContentSink, NativeRequest, NativeResponse};

/// An inbound axum request together with its connection addresses.
#[derive(Debug)]
pub struct AxumRequest {
    method: String,
    uri: String,
    version: Version,
    headers: HeaderMap,
    query: Option<String>,
    addresses: ConnectionAddresses,
    body: Option<Body>,
}

impl AxumRequest {
    pub fn new(request: Request<Body>, addresses: ConnectionAddresses) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method.as_str().to_string(),
            uri: parts.uri.to_string(),
            version: parts.version,
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            addresses,
            body: Some(body),
        }
    }
}

impl NativeRequest for AxumRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn http_version(&self) -> &str {
        match self.version {
            Version::HTTP_09 => "HTTP/0.9",
            Version::HTTP_10 => "HTTP/1.0",
            Version::HTTP_2 => "HTTP/2.0",
            Version::HTTP_3 => "HTTP/3.0",
            _ => "HTTP/1.1",
        }
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn headers(&self) -> impl Iterator<Item = (&str, Cow<'_, str>)> {
        self.headers
            .iter()
            .map(|(name, value)| (name.as_str(), header_text(name, value)))
    }

    fn query_parameters(&self) -> Vec<(String, Vec<String>)> {
        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        let Some(query) = self.query.as_deref() else {
            return grouped;
        };

        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match grouped.iter_mut().find(|(existing, _)| *existing == name) {
                Some((_, values)) => values.push(value.into_owned()),
                None => grouped.push((name.into_owned(), vec![value.into_owned()])),
            }
        }
        grouped
    }

    fn channel(&self) -> Option<&dyn NativeChannel> {
        Some(&self.addresses)
    }

    fn subscribe_content(&mut self, sink: ContentSink) {
        let Some(body) = self.body.take() else {
            tracing::warn!(uri = %self.uri, "Request content subscribed twice");
            return;
        };

        tokio::spawn(pump_body(body, sink));
    }
}

fn header_text<'a>(name: &HeaderName, value: &'a HeaderValue) -> Cow<'a, str> {
    match value.to_str() {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            tracing::debug!(header = %name, "Decoding obs-text header value as latin-1");
            Cow::Owned(value.as_bytes().iter().map(|&byte| char::from(byte)).collect())
        }
    }
}

async fn pump_body(body: Body, sink: ContentSink) {
    let mut frames = body.into_data_stream();
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(bytes) => {
                let chunk = BufferHandle::new(bytes);
                if let Err(err) = sink.on_next(&chunk) {
                    tracing::debug!(error = %err, "Request body no longer accepted");
                    return;
                }
                // The sink retained its own reference.
                chunk.release();
            }
            Err(err) => {
                tracing::debug!(error = %err, "Request body read failed");
                sink.on_error(err);
                return;
            }
        }
    }
    sink.on_complete();
}

/// Streams a response back through the axum handler that created it.
#[derive(Debug)]
pub struct AxumResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    head: Option<oneshot::Sender<Response<Body>>>,
    chunks: Option<mpsc::Sender<Bytes>>,
    invalid_status: Option<u16>,
}

impl AxumResponseWriter {
    /// A writer and the receiver its response head is delivered on.
    pub fn new() -> (Self, oneshot::Receiver<Response<Body>>) {
        let (head, receiver) = oneshot::channel();
        let writer = Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            head: Some(head),
            chunks: None,
            invalid_status: None,
        };
        (writer, receiver)
    }

    /// Whether the head has been handed to the handler.
    pub fn is_committed(&self) -> bool {
        self.head.is_none()
    }

    fn commit(&mut self, body: Body) {
        let Some(head) = self.head.take() else {
            return;
        };

        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = std::mem::take(&mut self.headers);
        if head.send(response).is_err() {
            tracing::debug!(status = %self.status, "Handler gone before response head was sent");
        }
    }

    fn open_body(&mut self) {
        if self.is_committed() {
            return;
        }

        let (sender, receiver) = mpsc::channel::<Bytes>(1);
        let body = stream::unfold(receiver, |mut receiver| async move {
            receiver
                .recv()
                .await
                .map(|bytes| (Ok::<_, Infallible>(bytes), receiver))
        });
        self.chunks = Some(sender);
        self.commit(Body::from_stream(body));
    }
}

impl NativeResponse for AxumResponseWriter {
    fn set_status(&mut self, status: u16) {
        self.status = match StatusCode::from_u16(status) {
            Ok(code) => {
                self.invalid_status = None;
                code
            }
            Err(_) => {
                tracing::warn!(error = %AdapterError::InvalidStatus(status), "Sending 500 instead");
                self.invalid_status = Some(status);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
    }

    fn add_header(&mut self, name: &str, value: &str) {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::warn!(header = %name, "Skipping response header not valid on the wire"),
        }
    }

    fn write_bytes_and_flush(
        &mut self,
        chunk: BufferHandle,
    ) -> impl Future<Output = AdapterResult<()>> + Send {
        let invalid_status = self.invalid_status;
        if invalid_status.is_some() {
            self.commit(Body::empty());
        } else {
            self.open_body();
        }
        let sender = self.chunks.clone();
        async move {
            if let Some(status) = invalid_status {
                chunk.release();
                return Err(AdapterError::InvalidStatus(status));
            }
            let sender = sender.ok_or(AdapterError::WriterClosed)?;
            let bytes = chunk.to_bytes();
            chunk.release();
            sender
                .send(bytes)
                .await
                .map_err(|_| AdapterError::WriterClosed)
        }
    }

    fn close(&mut self) {
        if !self.is_committed() {
            self.commit(Body::empty());
        }
        // Dropping the sender ends the streamed body.
        self.chunks = None;
    }
}

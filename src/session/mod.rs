//! Session adapter between the native HTTP layer and the neutral model.
//!
//! # Data Flow
//! ```text
//! ingress:
//!     native request
//!         → client IP, local port/host (net::address)
//!         → copy headers + query parameters
//!         → NeutralRequest { body: ReplayStream fed by ContentSink }
//!
//! egress:
//!     NeutralResponse
//!         → set_status → add_header per entry
//!         → write_bytes_and_flush per body chunk
//!         → close (always)
//! ```
//!
//! # Design Decisions
//! - Ingress never fails; translation errors surface on the request body stream
//! - Egress closes the writer on success, failure and cancellation alike
//! - Scheme comes from the listener configuration

pub mod native;

use futures_util::StreamExt;
use std::ops::{Deref, DerefMut};

use crate::config::GatewayConfig;
use crate::error::{AdapterError, AdapterResult};
use crate::message::{
    Headers, HeaderName, NeutralRequest, NeutralResponse, QueryParams, RequestParts, ResponseBody,
    SessionContext,
};
use crate::net::{client_ip, local_inet, AddressPreference};
use crate::stream::ReplayStream;

pub use native::{ContentSink, NativeRequest, NativeResponse};

/// Translates requests at ingress and responses at egress.
#[derive(Debug, Clone)]
pub struct SessionAdapter {
    scheme: String,
    client_ip_preference: AddressPreference,
    max_cached_body_bytes: Option<usize>,
}

impl SessionAdapter {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            scheme: config.listener.scheme.clone(),
            client_ip_preference: config.session.client_ip_preference,
            max_cached_body_bytes: config.session.max_cached_body_bytes,
        }
    }

    /// Build the neutral request for `native` and start feeding its body stream.
    pub fn ingress<R>(&self, native: &mut R) -> NeutralRequest
    where
        R: NativeRequest,
    {
        let context = SessionContext::new();

        // Forwarding headers are not consulted at this point.
        let channel = native.channel();
        let client_ip = client_ip(channel, self.client_ip_preference).unwrap_or_default();
        let local = local_inet(channel);
        let (port, server_name) = local
            .as_ref()
            .map(|addr| (addr.port(), addr.host_string()))
            .unwrap_or_default();

        let parts = RequestParts {
            protocol: native.http_version().to_string(),
            method: native.method().to_ascii_lowercase(),
            uri: native.uri().to_string(),
            query: copy_query_params(native),
            headers: copy_headers(native),
            client_ip,
            scheme: self.scheme.clone(),
            port,
            server_name,
        };

        let (producer, body) = ReplayStream::bounded(self.max_cached_body_bytes);
        let mut request = NeutralRequest::new(context, parts, body);
        request.store_inbound();

        if local.is_some() {
            native.subscribe_content(ContentSink::new(producer));
        } else {
            tracing::warn!(
                session_id = %request.context().id(),
                uri = %request.uri(),
                "No local address on channel, failing request body"
            );
            let _ = producer.fail(AdapterError::MissingLocalAddress);
        }

        tracing::debug!(
            session_id = %request.context().id(),
            method = %request.method(),
            uri = %request.uri(),
            client_ip = %request.client_ip(),
            port = request.port(),
            "Request translated at ingress"
        );

        request
    }

    /// Write `response` onto `writer`, returning the response once its body is fully flushed.
    pub async fn egress<W>(
        &self,
        mut response: NeutralResponse,
        writer: &mut W,
    ) -> AdapterResult<NeutralResponse>
    where
        W: NativeResponse,
    {
        let mut writer = ClosingWriter::new(writer);

        writer.set_status(response.status());
        // Multi-set, one line per entry.
        for header in response.headers() {
            writer.add_header(header.name().as_str(), header.value());
        }

        let outcome = match response.take_body() {
            Some(body) => write_body(&mut *writer, body).await,
            None => Ok(()),
        };
        writer.close();

        match &outcome {
            Ok(()) => tracing::debug!(status = response.status(), "Response written at egress"),
            Err(err) => tracing::warn!(
                status = response.status(),
                error = %err,
                "Response egress failed"
            ),
        }
        outcome.map(|()| response)
    }
}

impl Default for SessionAdapter {
    fn default() -> Self {
        Self::new(&GatewayConfig::default())
    }
}

async fn write_body<W>(writer: &mut W, mut body: ResponseBody) -> AdapterResult<()>
where
    W: NativeResponse,
{
    while let Some(chunk) = body.next().await {
        writer.write_bytes_and_flush(chunk?).await?;
    }
    Ok(())
}

fn copy_headers<R>(native: &R) -> Headers
where
    R: NativeRequest,
{
    let mut headers = Headers::new();
    for (name, value) in native.headers() {
        headers.add(HeaderName::intern(name), value.into_owned());
    }
    headers
}

fn copy_query_params<R>(native: &R) -> QueryParams
where
    R: NativeRequest,
{
    let mut params = QueryParams::new();
    for (name, values) in native.query_parameters() {
        for value in values {
            params.add(name.clone(), value);
        }
    }
    params
}

/// Closes the wrapped writer exactly once, including when egress is dropped mid-body.
struct ClosingWriter<'a, W: NativeResponse> {
    inner: &'a mut W,
    closed: bool,
}

impl<'a, W: NativeResponse> ClosingWriter<'a, W> {
    fn new(inner: &'a mut W) -> Self {
        Self {
            inner,
            closed: false,
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.inner.close();
        }
    }
}

impl<W: NativeResponse> Deref for ClosingWriter<'_, W> {
    type Target = W;

    fn deref(&self) -> &W {
        self.inner
    }
}

impl<W: NativeResponse> DerefMut for ClosingWriter<'_, W> {
    fn deref_mut(&mut self) -> &mut W {
        self.inner
    }
}

impl<W: NativeResponse> Drop for ClosingWriter<'_, W> {
    fn drop(&mut self) {
        self.close();
    }
}

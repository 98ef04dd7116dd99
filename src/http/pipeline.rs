//! The seam between the session adapter and request processing.

use std::future::Future;

use crate::message::{HeaderName, Headers, NeutralRequest, NeutralResponse};

/// Turns a translated request into a response.
pub trait Pipeline: Send + Sync + 'static {
    fn handle(&self, request: NeutralRequest) -> impl Future<Output = NeutralResponse> + Send;
}

/// Streams each request body straight back to the client.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoPipeline;

impl Pipeline for EchoPipeline {
    async fn handle(&self, request: NeutralRequest) -> NeutralResponse {
        let mut headers = Headers::new();
        if let Some(content_type) = request.headers().first(HeaderName::CONTENT_TYPE) {
            headers.add(HeaderName::CONTENT_TYPE, content_type);
        }
        headers.add(HeaderName::intern("x-session-id"), request.context().id().to_string());

        match request.body_stream() {
            Ok(body) => NeutralResponse::new(200).with_headers(headers).with_body(body),
            Err(err) => {
                tracing::warn!(
                    session_id = %request.context().id(),
                    error = %err,
                    "Request body unavailable"
                );
                NeutralResponse::new(500)
            }
        }
    }
}

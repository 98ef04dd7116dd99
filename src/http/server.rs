//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all gateway handler
//! - Wire up middleware (tracing, request timeout)
//! - Bind server to listener
//! - Translate each request at ingress, run the pipeline, write the response at egress

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::http::native::{AxumRequest, AxumResponseWriter};
use crate::http::pipeline::Pipeline;
use crate::net::ConnectionAddresses;
use crate::session::SessionAdapter;

/// Application state injected into handlers.
pub struct AppState<P> {
    pub adapter: SessionAdapter,
    pub pipeline: Arc<P>,
    pub local_address: SocketAddr,
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            adapter: self.adapter.clone(),
            pipeline: Arc::clone(&self.pipeline),
            local_address: self.local_address,
        }
    }
}

/// HTTP front end that bridges axum to a [`Pipeline`].
pub struct GatewayServer<P> {
    config: GatewayConfig,
    adapter: SessionAdapter,
    pipeline: Arc<P>,
}

impl<P: Pipeline> GatewayServer<P> {
    pub fn new(config: GatewayConfig, pipeline: P) -> Self {
        let adapter = SessionAdapter::new(&config);
        Self {
            config,
            adapter,
            pipeline: Arc::new(pipeline),
        }
    }

    /// Build the Axum router for a listener bound at `local_address`.
    #[allow(deprecated)]
    pub fn router(&self, local_address: SocketAddr) -> Router {
        let state = AppState {
            adapter: self.adapter.clone(),
            pipeline: Arc::clone(&self.pipeline),
            local_address,
        };

        Router::new()
            .route("/{*path}", any(gateway_handler::<P>))
            .route("/", any(gateway_handler::<P>))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            scheme = %self.config.listener.scheme,
            "Gateway server starting"
        );

        let app = self.router(addr).into_make_service_with_connect_info::<SocketAddr>();

        // Serve with graceful shutdown
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Gateway server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Bridges one axum request through ingress, the pipeline and egress.
///
/// Egress runs on its own task so the head can be returned while the body is still streaming.
async fn gateway_handler<P: Pipeline>(
    State(state): State<AppState<P>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let addresses = ConnectionAddresses {
        local: Some(state.local_address.into()),
        remote: Some(remote.into()),
    };
    let mut native = AxumRequest::new(request, addresses);
    let neutral = state.adapter.ingress(&mut native);
    let session_id = neutral.context().id();

    let (mut writer, head) = AxumResponseWriter::new();
    let adapter = state.adapter.clone();
    let pipeline = Arc::clone(&state.pipeline);
    tokio::spawn(async move {
        let response = pipeline.handle(neutral).await;
        if let Err(err) = adapter.egress(response, &mut writer).await {
            tracing::warn!(session_id = %session_id, error = %err, "Response not fully written");
        }
    });

    match head.await {
        Ok(response) => response,
        Err(_) => {
            tracing::error!(session_id = %session_id, "Pipeline ended without a response head");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

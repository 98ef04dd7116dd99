//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, catch-all handler)
//!     → native.rs (AxumRequest → SessionAdapter::ingress)
//!     → pipeline.rs (NeutralRequest → NeutralResponse)
//!     → native.rs (SessionAdapter::egress → AxumResponseWriter)
//!     → Send to client
//! ```

pub mod native;
pub mod pipeline;
pub mod server;

pub use native::{AxumRequest, AxumResponseWriter};
pub use pipeline::{EchoPipeline, Pipeline};
pub use server::{AppState, GatewayServer};

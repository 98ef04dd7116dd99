//! Gateway bridge library.
//!
//! Translates native HTTP requests into the gateway's neutral message model,
//! with a lazily consumed, replayable request body, and writes neutral
//! responses back through the native response writer.

pub mod buffer;
pub mod config;
pub mod error;
pub mod http;
pub mod message;
pub mod net;
pub mod observability;
pub mod session;
pub mod stream;

pub use buffer::{BufferHandle, BufferLedger};
pub use config::GatewayConfig;
pub use error::{AdapterError, AdapterResult};
pub use http::{EchoPipeline, GatewayServer, Pipeline};
pub use message::{NeutralRequest, NeutralResponse};
pub use session::SessionAdapter;
pub use stream::{ReplayProducer, ReplayStream, StreamError};

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields (session_id, uri, status)
//!
//! Consumers:
//!     → logging.rs (stdout, text or JSON)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Session ID flows through ingress and egress events

pub mod logging;

pub use logging::init_logging;

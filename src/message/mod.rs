//! Neutral message model shared by every gateway component.
//!
//! # Design Decisions
//! - Headers and query parameters are ordered multimaps; duplicates survive
//! - Request scalars are fixed at ingress; downstream edits headers and query only
//! - The request body is always present and consumed at most once

pub mod context;
pub mod headers;
pub mod query;
pub mod request;
pub mod response;

pub use context::SessionContext;
pub use headers::{Header, HeaderName, Headers};
pub use query::QueryParams;
pub use request::{NeutralRequest, RequestParts};
pub use response::{NeutralResponse, ResponseBody};

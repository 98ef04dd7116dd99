//! Body stream bridge between the network and downstream consumers.
//!
//! # Data Flow
//! ```text
//! network content (push, one chunk at a time)
//!     → ContentSink (retain chunk for transfer)
//!     → ReplayProducer::push
//!     → cache (FIFO) until a consumer attaches
//!     → attached consumer: Subscriber (push) or BodyStream (pull)
//! ```
//!
//! # States
//! ```text
//! Open --push*--> Open
//! Open --complete--> Completed --drain--> Disposed
//! Open --fail----> Failed    --drain--> Disposed
//! Open --consumer error--> Failed (pushes rejected)
//! Open --attach,cancel--> Disposed
//! ```
//!
//! # Design Decisions
//! - One producer, at most one consumer over the stream's whole life
//! - Cached and live items share one FIFO; only one drainer delivers at a time
//! - Disposal drops every still-cached item, which releases it

pub mod body;
pub mod replay;
pub mod subscriber;

use thiserror::Error;

pub use body::BodyStream;
pub use replay::{ReplayProducer, ReplayStream};
pub use subscriber::{Subscriber, Subscription};

/// Boxed error carried across the stream boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Lifecycle phase of a replay stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accepting pushes.
    Open,
    /// Producer ended normally; cached items not yet fully drained.
    Completed,
    /// Producer or the cache limit failed the stream and the error is not yet
    /// delivered, or the push subscriber failed and pushes are rejected.
    Failed,
    /// Terminal delivered or consumer cancelled. Nothing is cached.
    Disposed,
}

/// Errors raised by the body stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A second consumer tried to read the body.
    #[error("body stream already has a consumer")]
    AlreadyAttached,

    /// The producer pushed or terminated after its terminal signal.
    #[error("item pushed after the stream terminated")]
    AfterTerminal,

    /// The push subscriber rejected an item during delivery.
    #[error("body consumer failed: {0}")]
    Consumer(#[source] BoxError),

    /// The producer signalled an error.
    #[error("body producer failed: {0}")]
    Producer(#[source] BoxError),

    /// Cached, undelivered bytes exceeded the high-water mark.
    #[error("body cache exceeded {limit} bytes")]
    Overflow { limit: usize },

    /// The push subscriber failed earlier; the stream takes no more items.
    #[error("body consumer failed, item rejected")]
    Rejected,

    /// The stream was disposed before the consumer saw a terminal.
    #[error("body stream was disposed")]
    Disposed,

    /// The producer was dropped without completing.
    #[error("body producer went away before completing")]
    Aborted,
}

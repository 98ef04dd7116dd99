//! Push-style consumers.

use std::fmt;
use std::sync::Arc;

use super::replay::Shared;
use super::{BoxError, StreamError};
use crate::buffer::Weighted;

/// A consumer that receives items synchronously as they become available.
///
/// Callbacks run outside the stream's lock, so a subscriber may cancel its own
/// `Subscription` from inside `on_next`.
pub trait Subscriber<T>: Send {
    /// Take ownership of the next item. Returning an error fails the stream,
    /// releases the cache and makes the producer's next push fail with `Rejected`.
    fn on_next(&mut self, item: T) -> Result<(), BoxError>;

    fn on_complete(&mut self);

    fn on_error(&mut self, error: StreamError);
}

/// Handle to an attached push subscriber.
///
/// Dropping the handle detaches it without cancelling; call `cancel()` to stop delivery.
pub struct Subscription<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Subscription<T>
where
    T: Weighted + Send + 'static,
{
    pub(super) fn new(shared: Arc<Shared<T>>) -> Self {
        Self { shared }
    }

    /// Stop delivery and release everything still cached.
    /// No callback follows a cancel.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// False once cancelled, disposed, terminated or failed by the subscriber.
    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

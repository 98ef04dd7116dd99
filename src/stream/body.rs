//! Pull-style consumer over a replay stream.

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use super::replay::Shared;
use super::StreamError;
use crate::buffer::{BufferHandle, Weighted};

/// The consumer half of a replay stream as a `futures` stream.
///
/// Yields cached items first, then live ones, ending with `None` on completion
/// or a single `Err` on failure. Dropping it cancels the stream and releases
/// anything still cached.
pub struct BodyStream<T>
where
    T: Weighted + Send + 'static,
{
    shared: Arc<Shared<T>>,
}

impl<T> BodyStream<T>
where
    T: Weighted + Send + 'static,
{
    pub(super) fn new(shared: Arc<Shared<T>>) -> Self {
        Self { shared }
    }
}

impl BodyStream<BufferHandle> {
    /// Collect the whole body, releasing each chunk once copied.
    pub async fn into_bytes(mut self) -> Result<Bytes, StreamError> {
        let mut body = BytesMut::new();
        while let Some(chunk) = self.next().await {
            body.extend_from_slice(&chunk?);
        }
        Ok(body.freeze())
    }
}

impl<T> Stream for BodyStream<T>
where
    T: Weighted + Send + 'static,
{
    type Item = Result<T, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.shared.poll_pull(cx)
    }
}

impl<T> Drop for BodyStream<T>
where
    T: Weighted + Send + 'static,
{
    fn drop(&mut self) {
        self.shared.cancel();
    }
}

impl<T> fmt::Debug for BodyStream<T>
where
    T: Weighted + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyStream")
            .field("phase", &self.shared.phase())
            .finish()
    }
}

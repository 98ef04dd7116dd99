//! Caching, single-consumer replay stream.
//!
//! # Responsibilities
//! - Accept pushes from one producer before and after a consumer attaches
//! - Deliver cached then live items to exactly one consumer, in arrival order
//! - Hold a producer terminal (completion or error) for a late consumer
//! - Release cached items on cancellation, failure or overflow
//!
//! # Design Decisions
//! - One `Mutex` per stream serializes every operation; callbacks run unlocked
//! - A push subscriber is taken out of its slot while being called (`Delivering`),
//!   so exactly one caller drains and concurrent pushes only append
//! - Errors from the producer before a consumer attaches release the cache at
//!   once; only the error is kept
//! - A failed push subscriber leaves the stream `Failed`; later pushes are
//!   rejected so the producer can stop reading

use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use super::{BodyStream, BoxError, Phase, StreamError, Subscriber, Subscription};
use crate::buffer::Weighted;

enum Terminal {
    Completed,
    Failed(StreamError),
}

enum Slot<T> {
    /// No consumer yet.
    Vacant,
    /// Push subscriber waiting for items.
    Push(Box<dyn Subscriber<T>>),
    /// Push subscriber currently being called by a drainer.
    Delivering,
    /// Pull consumer, with the waker of its last pending poll.
    Pull(Option<Waker>),
    /// Consumer finished or cancelled.
    Gone,
}

enum Wake {
    Drain,
    Waker(Waker),
}

struct Inner<T> {
    phase: Phase,
    cache: VecDeque<T>,
    cached_weight: usize,
    high_water_mark: Option<usize>,
    /// Producer terminal not yet delivered to the consumer.
    terminal: Option<Terminal>,
    producer_done: bool,
    attached: bool,
    /// The push subscriber returned an error; no more items are accepted.
    consumer_failed: bool,
    /// Disposed from outside while a drainer held the subscriber.
    cut_off: bool,
    consumer: Slot<T>,
}

impl<T: Weighted> Inner<T> {
    fn pop(&mut self) -> Option<T> {
        let item = self.cache.pop_front()?;
        self.cached_weight = self.cached_weight.saturating_sub(item.weight());
        Some(item)
    }

    fn take_cache(&mut self) -> VecDeque<T> {
        self.cached_weight = 0;
        mem::take(&mut self.cache)
    }

    fn wake(&mut self) -> Option<Wake> {
        match &mut self.consumer {
            Slot::Push(_) => Some(Wake::Drain),
            Slot::Pull(waker) => waker.take().map(Wake::Waker),
            _ => None,
        }
    }

    fn claim(&mut self) -> Result<(), StreamError> {
        if self.attached {
            return Err(StreamError::AlreadyAttached);
        }
        if self.phase == Phase::Disposed {
            return Err(StreamError::Disposed);
        }
        self.attached = true;
        Ok(())
    }
}

pub(super) struct Shared<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> Shared<T>
where
    T: Weighted + Send + 'static,
{
    fn new(high_water_mark: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                phase: Phase::Open,
                cache: VecDeque::new(),
                cached_weight: 0,
                high_water_mark,
                terminal: None,
                producer_done: false,
                attached: false,
                consumer_failed: false,
                cut_off: false,
                consumer: Slot::Vacant,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, wake: Option<Wake>) {
        match wake {
            Some(Wake::Drain) => self.drain(),
            Some(Wake::Waker(waker)) => waker.wake(),
            None => {}
        }
    }

    pub(super) fn phase(&self) -> Phase {
        self.lock().phase
    }

    fn push(&self, item: T) -> Result<(), StreamError> {
        let mut inner = self.lock();
        if inner.producer_done {
            drop(inner);
            drop(item);
            return Err(StreamError::AfterTerminal);
        }
        if inner.consumer_failed {
            drop(inner);
            drop(item);
            return Err(StreamError::Rejected);
        }
        if inner.phase == Phase::Disposed {
            drop(inner);
            tracing::trace!("Releasing chunk pushed after cancellation");
            drop(item);
            return Ok(());
        }

        let weight = item.weight();
        if let Some(limit) = inner.high_water_mark {
            if inner.cached_weight + weight > limit {
                inner.producer_done = true;
                inner.phase = Phase::Failed;
                inner.terminal = Some(Terminal::Failed(StreamError::Overflow { limit }));
                let released = inner.take_cache();
                let wake = inner.wake();
                drop(inner);

                tracing::warn!(
                    limit,
                    released = released.len() + 1,
                    "Body stream cache overflowed"
                );
                drop(released);
                drop(item);
                self.notify(wake);
                return Err(StreamError::Overflow { limit });
            }
        }

        inner.cache.push_back(item);
        inner.cached_weight += weight;
        let wake = inner.wake();
        drop(inner);
        self.notify(wake);
        Ok(())
    }

    fn finish(&self, terminal: Terminal) -> Result<(), StreamError> {
        let mut inner = self.lock();
        if inner.producer_done {
            return Err(StreamError::AfterTerminal);
        }
        inner.producer_done = true;
        if inner.phase == Phase::Disposed || inner.consumer_failed {
            return Ok(());
        }

        let released = match &terminal {
            Terminal::Completed => {
                inner.phase = Phase::Completed;
                VecDeque::new()
            }
            Terminal::Failed(_) => {
                inner.phase = Phase::Failed;
                if matches!(inner.consumer, Slot::Vacant) {
                    inner.take_cache()
                } else {
                    VecDeque::new()
                }
            }
        };
        inner.terminal = Some(terminal);
        let wake = inner.wake();
        drop(inner);

        if !released.is_empty() {
            tracing::trace!(
                released = released.len(),
                "Released cached body after producer failure"
            );
        }
        drop(released);
        self.notify(wake);
        Ok(())
    }

    fn attach(&self, subscriber: Box<dyn Subscriber<T>>) -> Result<(), StreamError> {
        let mut inner = self.lock();
        inner.claim()?;
        inner.consumer = Slot::Push(subscriber);
        drop(inner);
        self.drain();
        Ok(())
    }

    fn claim_pull(&self) -> Result<(), StreamError> {
        let mut inner = self.lock();
        inner.claim()?;
        inner.consumer = Slot::Pull(None);
        Ok(())
    }

    /// Deliver everything available to the push subscriber, unless another
    /// caller is already doing so.
    fn drain(&self) {
        let mut inner = self.lock();
        let mut subscriber = match mem::replace(&mut inner.consumer, Slot::Delivering) {
            Slot::Push(subscriber) => subscriber,
            other => {
                inner.consumer = other;
                return;
            }
        };

        loop {
            if inner.phase == Phase::Disposed {
                // Cancelled while an item was being delivered.
                let cut_off = mem::take(&mut inner.cut_off);
                inner.consumer = Slot::Gone;
                drop(inner);
                if cut_off {
                    subscriber.on_error(StreamError::Disposed);
                }
                return;
            }

            if let Some(item) = inner.pop() {
                drop(inner);
                let outcome = subscriber.on_next(item);
                inner = self.lock();

                if let Err(err) = outcome {
                    inner.phase = Phase::Failed;
                    inner.terminal = None;
                    inner.consumer = Slot::Gone;
                    inner.consumer_failed = true;
                    let released = inner.take_cache();
                    drop(inner);

                    tracing::debug!(
                        released = released.len(),
                        error = %err,
                        "Body consumer failed, stream rejects further items"
                    );
                    drop(released);
                    subscriber.on_error(StreamError::Consumer(err));
                    return;
                }
                continue;
            }

            if let Some(terminal) = inner.terminal.take() {
                inner.phase = Phase::Disposed;
                inner.consumer = Slot::Gone;
                drop(inner);
                match terminal {
                    Terminal::Completed => subscriber.on_complete(),
                    Terminal::Failed(err) => subscriber.on_error(err),
                }
                return;
            }

            inner.consumer = Slot::Push(subscriber);
            return;
        }
    }

    pub(super) fn poll_pull(&self, cx: &mut Context<'_>) -> Poll<Option<Result<T, StreamError>>> {
        let mut inner = self.lock();
        if let Some(item) = inner.pop() {
            return Poll::Ready(Some(Ok(item)));
        }

        if let Some(terminal) = inner.terminal.take() {
            inner.phase = Phase::Disposed;
            inner.consumer = Slot::Gone;
            return Poll::Ready(match terminal {
                Terminal::Completed => None,
                Terminal::Failed(err) => Some(Err(err)),
            });
        }

        match &mut inner.consumer {
            Slot::Pull(waker) => {
                match waker {
                    Some(current) if current.will_wake(cx.waker()) => {}
                    _ => *waker = Some(cx.waker().clone()),
                }
                Poll::Pending
            }
            _ => Poll::Ready(None),
        }
    }

    pub(super) fn is_active(&self) -> bool {
        let inner = self.lock();
        inner.phase != Phase::Disposed && !inner.consumer_failed
    }

    /// Dispose from outside the consumer. A push subscriber is told with `Disposed`.
    pub(super) fn dispose(&self) {
        self.shutdown(true);
    }

    /// Dispose on the consumer's own request, without calling it back.
    pub(super) fn cancel(&self) {
        self.shutdown(false);
    }

    fn shutdown(&self, notify: bool) {
        let mut inner = self.lock();
        if inner.phase == Phase::Disposed {
            return;
        }
        inner.phase = Phase::Disposed;
        inner.terminal = None;
        let released = inner.take_cache();

        let mut waker = None;
        let subscriber = match mem::replace(&mut inner.consumer, Slot::Gone) {
            Slot::Push(subscriber) => Some(subscriber),
            Slot::Delivering => {
                inner.consumer = Slot::Delivering;
                inner.cut_off = notify;
                None
            }
            Slot::Pull(pending) => {
                // Let a live pull consumer observe the cut-off once.
                inner.consumer = Slot::Pull(None);
                inner.terminal = Some(Terminal::Failed(StreamError::Disposed));
                waker = pending;
                None
            }
            Slot::Vacant | Slot::Gone => None,
        };
        drop(inner);

        tracing::trace!(released = released.len(), "Body stream disposed");
        drop(released);
        if let Some(mut subscriber) = subscriber {
            if notify {
                subscriber.on_error(StreamError::Disposed);
            }
        }
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    fn dispose_unclaimed(&self) {
        let attached = self.lock().attached;
        if !attached {
            self.dispose();
        }
    }

    fn cached_len(&self) -> usize {
        self.lock().cache.len()
    }
}

/// Producer half of a replay stream. There is exactly one per stream.
///
/// Dropping it before `complete` or `fail` fails the stream with `Aborted`.
pub struct ReplayProducer<T>
where
    T: Weighted + Send + 'static,
{
    shared: Arc<Shared<T>>,
}

impl<T> ReplayProducer<T>
where
    T: Weighted + Send + 'static,
{
    /// Hand one item to the stream. The caller must already own it for the transfer.
    pub fn push(&self, item: T) -> Result<(), StreamError> {
        self.shared.push(item)
    }

    /// Signal the normal end of the stream.
    pub fn complete(&self) -> Result<(), StreamError> {
        self.shared.finish(Terminal::Completed)
    }

    /// Signal an error; a late consumer receives it as `StreamError::Producer`.
    pub fn fail(&self, error: impl Into<BoxError>) -> Result<(), StreamError> {
        self.shared
            .finish(Terminal::Failed(StreamError::Producer(error.into())))
    }

    pub fn phase(&self) -> Phase {
        self.shared.phase()
    }
}

impl<T> Drop for ReplayProducer<T>
where
    T: Weighted + Send + 'static,
{
    fn drop(&mut self) {
        let _ = self.shared.finish(Terminal::Failed(StreamError::Aborted));
    }
}

impl<T> fmt::Debug for ReplayProducer<T>
where
    T: Weighted + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayProducer")
            .field("phase", &self.shared.phase())
            .finish()
    }
}

/// Consumer half of a replay stream.
///
/// Dropping it without ever attaching a consumer disposes the stream.
pub struct ReplayStream<T>
where
    T: Weighted + Send + 'static,
{
    shared: Arc<Shared<T>>,
}

impl<T> ReplayStream<T>
where
    T: Weighted + Send + 'static,
{
    /// Create an unbounded stream.
    pub fn channel() -> (ReplayProducer<T>, ReplayStream<T>) {
        Self::bounded(None)
    }

    /// Create a stream whose cache may hold at most `high_water_mark` weight
    /// of undelivered items.
    pub fn bounded(high_water_mark: Option<usize>) -> (ReplayProducer<T>, ReplayStream<T>) {
        let shared = Arc::new(Shared::new(high_water_mark));
        (
            ReplayProducer {
                shared: Arc::clone(&shared),
            },
            ReplayStream { shared },
        )
    }

    /// Attach the single push consumer. Cached items are delivered before this returns.
    pub fn attach<S>(&self, subscriber: S) -> Result<Subscription<T>, StreamError>
    where
        S: Subscriber<T> + 'static,
    {
        self.shared.attach(Box::new(subscriber))?;
        Ok(Subscription::new(Arc::clone(&self.shared)))
    }

    /// Attach the single pull consumer.
    pub fn subscribe(&self) -> Result<BodyStream<T>, StreamError> {
        self.shared.claim_pull()?;
        Ok(BodyStream::new(Arc::clone(&self.shared)))
    }

    /// Release every cached item and stop accepting work. Idempotent.
    pub fn dispose(&self) {
        self.shared.dispose();
    }

    pub fn phase(&self) -> Phase {
        self.shared.phase()
    }

    /// Number of items cached and not yet delivered.
    pub fn cached_len(&self) -> usize {
        self.shared.cached_len()
    }
}

impl<T> Drop for ReplayStream<T>
where
    T: Weighted + Send + 'static,
{
    fn drop(&mut self) {
        self.shared.dispose_unclaimed();
    }
}

impl<T> fmt::Debug for ReplayStream<T>
where
    T: Weighted + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayStream")
            .field("phase", &self.shared.phase())
            .field("cached", &self.shared.cached_len())
            .finish()
    }
}

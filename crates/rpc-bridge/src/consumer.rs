//! Push-callback consumers and the cancellation probe
//!
//! A [`PushConsumer`] is what a transport drives: `on_next` for each message,
//! then exactly one of `on_error` or `on_completed`.
//!
//! Some consumers can also tell whether their downstream went away. They expose
//! this through [`PushConsumer::as_cancellable`], and producers ask with
//! [`is_cancelled`] before every push.
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::Error;

pub trait PushConsumer<T>: Send + Sync {
    fn on_next(&self, value: T);
    fn on_error(&self, error: Error);
    fn on_completed(&self);
    /// The cancellation capability of this consumer, if it has one
    fn as_cancellable(&self) -> Option<&dyn Cancellable> {
        None
    }
}

pub trait Cancellable: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

impl<T, C: PushConsumer<T> + ?Sized> PushConsumer<T> for Arc<C> {
    fn on_next(&self, value: T) {
        self.as_ref().on_next(value)
    }
    fn on_error(&self, error: Error) {
        self.as_ref().on_error(error)
    }
    fn on_completed(&self) {
        self.as_ref().on_completed()
    }
    fn as_cancellable(&self) -> Option<&dyn Cancellable> {
        self.as_ref().as_cancellable()
    }
}

impl<T, C: PushConsumer<T> + ?Sized> PushConsumer<T> for Box<C> {
    fn on_next(&self, value: T) {
        self.as_ref().on_next(value)
    }
    fn on_error(&self, error: Error) {
        self.as_ref().on_error(error)
    }
    fn on_completed(&self) {
        self.as_ref().on_completed()
    }
    fn as_cancellable(&self) -> Option<&dyn Cancellable> {
        self.as_ref().as_cancellable()
    }
}

pub type BoxConsumer<T> = Box<dyn PushConsumer<T>>;

/// Returns true only if the consumer can be cancelled and reports that it was
#[inline]
pub fn is_cancelled<T, C: PushConsumer<T> + ?Sized>(consumer: &C) -> bool {
    consumer
        .as_cancellable()
        .is_some_and(|c| c.is_cancelled())
}

/// Run `action` with the consumer unless it was cancelled
#[inline]
pub fn when_not_cancelled<T, C, F, R>(consumer: &C, action: F) -> Option<R>
where
    C: PushConsumer<T> + ?Sized,
    F: FnOnce(&C) -> R,
{
    if is_cancelled(consumer) {
        None
    } else {
        Some(action(consumer))
    }
}

/// Run exactly one of `action` and `on_cancelled`
#[inline]
pub fn when_not_cancelled_else<T, C, F, G, R>(consumer: &C, action: F, on_cancelled: G) -> R
where
    C: PushConsumer<T> + ?Sized,
    F: FnOnce(&C) -> R,
    G: FnOnce() -> R,
{
    if is_cancelled(consumer) {
        on_cancelled()
    } else {
        action(consumer)
    }
}

/// A consumer made of three closures
///
/// ```rust
/// # use rpc_bridge::{Error, consumer::{FnConsumer, PushConsumer}};
/// let consumer = FnConsumer::new(
///     |value: i32| println!("next {value}"),
///     |error: Error| println!("error {error}"),
///     || println!("completed"),
/// );
/// consumer.on_next(1);
/// consumer.on_completed();
/// ```
pub struct FnConsumer<N, E, C> {
    next: N,
    error: E,
    completed: C,
}

impl<N, E, C> FnConsumer<N, E, C> {
    pub fn new(next: N, error: E, completed: C) -> Self {
        Self {
            next,
            error,
            completed,
        }
    }
}

impl<T, N, E, C> PushConsumer<T> for FnConsumer<N, E, C>
where
    N: Fn(T) + Send + Sync,
    E: Fn(Error) + Send + Sync,
    C: Fn() + Send + Sync,
{
    fn on_next(&self, value: T) {
        (self.next)(value)
    }
    fn on_error(&self, error: Error) {
        (self.error)(error)
    }
    fn on_completed(&self) {
        (self.completed)()
    }
}

/// Attach a [`CancellationToken`] to any consumer, making it cancellable
///
/// This is how a transport call that knows about peer cancellation presents
/// itself to the wrappers.
#[derive(Debug, Clone)]
pub struct WithCancellation<C> {
    inner: C,
    ct: CancellationToken,
}

impl<C> WithCancellation<C> {
    pub fn new(inner: C, ct: CancellationToken) -> Self {
        Self { inner, ct }
    }
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<T, C: PushConsumer<T>> PushConsumer<T> for WithCancellation<C> {
    fn on_next(&self, value: T) {
        self.inner.on_next(value)
    }
    fn on_error(&self, error: Error) {
        self.inner.on_error(error)
    }
    fn on_completed(&self) {
        self.inner.on_completed()
    }
    fn as_cancellable(&self) -> Option<&dyn Cancellable> {
        Some(self)
    }
}

impl<C: Send + Sync> Cancellable for WithCancellation<C> {
    fn is_cancelled(&self) -> bool {
        self.ct.is_cancelled()
    }
}

use std::{
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll, ready},
};

use futures::future::FusedFuture;
use tokio::sync::oneshot;

use super::{ForwardOutcome, TerminalFlag};
use crate::{
    Error,
    consumer::{Cancellable, PushConsumer, is_cancelled},
};

type Outcome<T> = Result<T, Error>;
type Responder<T> = oneshot::Sender<Outcome<T>>;

/// Create a single-value bridge
///
/// The first `on_next` or `on_error` pushed into the [`OneBridge`] settles the
/// [`OneReceiver`]; everything after that is dropped.
///
/// `on_completed` alone never settles the receiver: a unary call that completes
/// without a value leaves the receiver pending forever.
pub fn one<T>() -> (OneBridge<T>, OneReceiver<T>) {
    let (tx, rx) = oneshot::channel();
    let bridge = OneBridge {
        shared: Arc::new(OneShared {
            terminal: TerminalFlag::default(),
            responder: Mutex::new(Some(tx)),
        }),
    };
    let receiver = OneReceiver {
        rx,
        abandoned: false,
        settled: false,
    };
    (bridge, receiver)
}

struct OneShared<T> {
    terminal: TerminalFlag,
    responder: Mutex<Option<Responder<T>>>,
}

impl<T> OneShared<T> {
    fn responder(&self) -> MutexGuard<'_, Option<Responder<T>>> {
        // the slot is only ever taken, a poisoned guard still holds a valid state
        self.responder.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, outcome: Outcome<T>) {
        if !self.terminal.try_terminate() {
            tracing::trace!("one-shot bridge already settled, signal dropped");
            return;
        }
        let Some(responder) = self.responder().take() else {
            return;
        };
        if responder.send(outcome).is_err() {
            tracing::trace!("one-shot receiver gone, outcome dropped");
        }
    }
}

impl<T> Drop for OneShared<T> {
    fn drop(&mut self) {
        let receiver_alive = self
            .responder()
            .as_ref()
            .is_some_and(|responder| !responder.is_closed());
        if receiver_alive {
            tracing::warn!("one-shot bridge dropped without a value, the response will never settle");
        }
    }
}

/// The push half of a single-value bridge
pub struct OneBridge<T> {
    shared: Arc<OneShared<T>>,
}

impl<T> Clone for OneBridge<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> std::fmt::Debug for OneBridge<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneBridge")
            .field("terminated", &self.shared.terminal.is_terminated())
            .finish()
    }
}

impl<T> OneBridge<T> {
    pub fn is_terminated(&self) -> bool {
        self.shared.terminal.is_terminated()
    }
}

impl<T: Send> PushConsumer<T> for OneBridge<T> {
    fn on_next(&self, value: T) {
        self.shared.settle(Ok(value));
    }

    fn on_error(&self, error: Error) {
        self.shared.settle(Err(error));
    }

    fn on_completed(&self) {
        // a value, if any, has already settled the receiver
    }

    fn as_cancellable(&self) -> Option<&dyn Cancellable> {
        Some(self)
    }
}

impl<T: Send> Cancellable for OneBridge<T> {
    /// The receiver was dropped before the bridge settled
    fn is_cancelled(&self) -> bool {
        self.shared
            .responder()
            .as_ref()
            .is_some_and(|responder| responder.is_closed())
    }
}

/// The pull half of a single-value bridge
#[derive(Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct OneReceiver<T> {
    rx: oneshot::Receiver<Outcome<T>>,
    // the bridge went away unsettled, stay pending
    abandoned: bool,
    settled: bool,
}

impl<T> Future for OneReceiver<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        // fused: once settled, or once the bridge went away unsettled
        if this.settled || this.abandoned {
            return Poll::Pending;
        }
        match ready!(Pin::new(&mut this.rx).poll(cx)) {
            Ok(outcome) => {
                this.settled = true;
                Poll::Ready(outcome)
            }
            Err(_) => {
                this.abandoned = true;
                Poll::Pending
            }
        }
    }
}

impl<T> FusedFuture for OneReceiver<T> {
    fn is_terminated(&self) -> bool {
        self.settled
    }
}

pin_project_lite::pin_project! {
    /// Future returned by [`forward_one`]
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct ForwardOne<F, C> {
        #[pin]
        future: F,
        consumer: C,
    }
}

/// Drive `future` and push its outcome into `consumer`
///
/// A value is pushed as `on_next` followed by `on_completed`, unless the
/// consumer was cancelled by then. An error is pushed as `on_error`.
pub fn forward_one<F, C, T>(future: F, consumer: C) -> ForwardOne<F, C>
where
    F: Future<Output = Outcome<T>>,
    C: PushConsumer<T>,
{
    ForwardOne { future, consumer }
}

impl<F, C, T> Future for ForwardOne<F, C>
where
    F: Future<Output = Outcome<T>>,
    C: PushConsumer<T>,
{
    type Output = ForwardOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let outcome = match ready!(this.future.poll(cx)) {
            Ok(value) => {
                if is_cancelled(&*this.consumer) {
                    tracing::debug!("consumer cancelled, value not forwarded");
                    ForwardOutcome::Cancelled
                } else {
                    this.consumer.on_next(value);
                    this.consumer.on_completed();
                    ForwardOutcome::Completed
                }
            }
            Err(error) => {
                tracing::debug!(%error, "forwarding error");
                this.consumer.on_error(error);
                ForwardOutcome::Failed
            }
        };
        Poll::Ready(outcome)
    }
}

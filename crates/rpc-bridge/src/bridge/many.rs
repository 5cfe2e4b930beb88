use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, ready},
};

use futures::{Stream, stream::FusedStream};
use tokio::sync::mpsc;

use super::{ForwardOutcome, TerminalFlag};
use crate::{
    Error,
    consumer::{Cancellable, PushConsumer, when_not_cancelled_else},
};

#[derive(Debug)]
enum Signal<T> {
    Next(T),
    Error(Error),
    Completed,
}

/// Create a multi-value bridge
///
/// Values pushed into the [`ManyBridge`] are buffered without bound and handed
/// out by the [`ManyReceiver`] one per poll, in push order, with the terminal
/// signal last.
pub fn many<T>() -> (ManyBridge<T>, ManyReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let bridge = ManyBridge {
        shared: Arc::new(ManyShared {
            terminal: TerminalFlag::default(),
            tx,
        }),
    };
    let receiver = ManyReceiver {
        rx,
        cancelled: false,
        done: false,
    };
    (bridge, receiver)
}

struct ManyShared<T> {
    terminal: TerminalFlag,
    tx: mpsc::UnboundedSender<Signal<T>>,
}

impl<T> ManyShared<T> {
    fn push(&self, signal: Signal<T>) {
        if self.tx.send(signal).is_err() {
            tracing::trace!("stream receiver gone, signal dropped");
        }
    }
}

/// The push half of a multi-value bridge
pub struct ManyBridge<T> {
    shared: Arc<ManyShared<T>>,
}

impl<T> Clone for ManyBridge<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> std::fmt::Debug for ManyBridge<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManyBridge")
            .field("terminated", &self.shared.terminal.is_terminated())
            .field("receiver_closed", &self.shared.tx.is_closed())
            .finish()
    }
}

impl<T> ManyBridge<T> {
    pub fn is_terminated(&self) -> bool {
        self.shared.terminal.is_terminated()
    }
}

impl<T: Send> PushConsumer<T> for ManyBridge<T> {
    fn on_next(&self, value: T) {
        if self.shared.terminal.is_terminated() {
            tracing::trace!("stream bridge terminated, value dropped");
            return;
        }
        // a value racing a terminal signal may land behind it, the receiver
        // stops at the terminal and never yields it
        self.shared.push(Signal::Next(value));
    }

    fn on_error(&self, error: Error) {
        if self.shared.terminal.try_terminate() {
            self.shared.push(Signal::Error(error));
        } else {
            tracing::trace!(%error, "stream bridge terminated, error dropped");
        }
    }

    fn on_completed(&self) {
        if self.shared.terminal.try_terminate() {
            self.shared.push(Signal::Completed);
        } else {
            tracing::trace!("stream bridge terminated, completion dropped");
        }
    }

    fn as_cancellable(&self) -> Option<&dyn Cancellable> {
        Some(self)
    }
}

impl<T: Send> Cancellable for ManyBridge<T> {
    /// The receiver was dropped or cancelled
    fn is_cancelled(&self) -> bool {
        self.shared.tx.is_closed()
    }
}

/// The pull half of a multi-value bridge
///
/// Yields `Ok` for each value, then either ends or yields one `Err` and ends.
#[derive(Debug)]
#[must_use = "streams do nothing unless polled"]
pub struct ManyReceiver<T> {
    rx: mpsc::UnboundedReceiver<Signal<T>>,
    cancelled: bool,
    done: bool,
}

impl<T> ManyReceiver<T> {
    /// Stop accepting new values
    ///
    /// The bridge reports cancelled from now on. Values already buffered can
    /// still be drained.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.rx.close();
    }
}

impl<T> Stream for ManyReceiver<T> {
    type Item = Result<T, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        let item = match ready!(this.rx.poll_recv(cx)) {
            Some(Signal::Next(value)) => Some(Ok(value)),
            Some(Signal::Error(error)) => {
                this.done = true;
                Some(Err(error))
            }
            Some(Signal::Completed) => {
                this.done = true;
                None
            }
            None => {
                this.done = true;
                if this.cancelled {
                    // drained after `cancel`
                    None
                } else {
                    Some(Err(Error::Disconnected))
                }
            }
        };
        Poll::Ready(item)
    }
}

impl<T> FusedStream for ManyReceiver<T> {
    fn is_terminated(&self) -> bool {
        self.done
    }
}

pin_project_lite::pin_project! {
    /// Future returned by [`forward_many`]
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct ForwardMany<S, C> {
        #[pin]
        stream: S,
        consumer: C,
    }
}

/// Drive `stream` and push every item into `consumer`
///
/// The consumer is probed before every `on_next`. Once it reports cancelled
/// the loop stops without a terminal signal, and dropping the future drops
/// the stream.
pub fn forward_many<S, C, T>(stream: S, consumer: C) -> ForwardMany<S, C>
where
    S: Stream<Item = Result<T, Error>>,
    C: PushConsumer<T>,
{
    ForwardMany { stream, consumer }
}

impl<S, C, T> Future for ForwardMany<S, C>
where
    S: Stream<Item = Result<T, Error>>,
    C: PushConsumer<T>,
{
    type Output = ForwardOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();
        loop {
            match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(Ok(value)) => {
                    let forwarded = when_not_cancelled_else(
                        &*this.consumer,
                        |consumer| {
                            consumer.on_next(value);
                            true
                        },
                        || false,
                    );
                    if !forwarded {
                        tracing::debug!("consumer cancelled, stop forwarding");
                        return Poll::Ready(ForwardOutcome::Cancelled);
                    }
                }
                Some(Err(error)) => {
                    tracing::debug!(%error, "forwarding error");
                    this.consumer.on_error(error);
                    return Poll::Ready(ForwardOutcome::Failed);
                }
                None => {
                    this.consumer.on_completed();
                    return Poll::Ready(ForwardOutcome::Completed);
                }
            }
        }
    }
}

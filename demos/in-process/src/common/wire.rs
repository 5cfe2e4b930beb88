//! An in-process stand-in for a network transport
//!
//! Every signal pushed into a [`Wire`] is delivered to the far end from a
//! dedicated I/O thread, the way a real stub calls back from its event loop.
use std::{sync::Arc, thread};

use rpc_bridge::{Cancellable, Error, PushConsumer, consumer::is_cancelled};
use tokio::sync::mpsc;

enum Frame<T> {
    Next(T),
    Error(Error),
    Completed,
}

pub struct Wire<T> {
    tx: mpsc::UnboundedSender<Frame<T>>,
    far: Arc<dyn PushConsumer<T>>,
}

impl<T: Send + 'static> Wire<T> {
    pub fn connect(name: &'static str, far: impl PushConsumer<T> + 'static) -> Self {
        let far: Arc<dyn PushConsumer<T>> = Arc::new(far);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reader = far.clone();
        thread::spawn(move || {
            let span = tracing::debug_span!("wire", name);
            let _guard = span.enter();
            // a plain thread, outside any runtime, so blocking here is fine
            while let Some(frame) = rx.blocking_recv() {
                match frame {
                    Frame::Next(value) => reader.on_next(value),
                    Frame::Error(error) => {
                        tracing::debug!(%error, "delivering error");
                        reader.on_error(error)
                    }
                    Frame::Completed => reader.on_completed(),
                }
            }
            tracing::trace!("wire closed");
        });
        Self { tx, far }
    }

    fn send(&self, frame: Frame<T>) {
        if self.tx.send(frame).is_err() {
            tracing::warn!("wire thread is gone, frame dropped");
        }
    }
}

impl<T: Send + 'static> PushConsumer<T> for Wire<T> {
    fn on_next(&self, value: T) {
        self.send(Frame::Next(value))
    }
    fn on_error(&self, error: Error) {
        self.send(Frame::Error(error))
    }
    fn on_completed(&self) {
        self.send(Frame::Completed)
    }
    fn as_cancellable(&self) -> Option<&dyn Cancellable> {
        Some(self)
    }
}

/// A wire is cancelled when whoever listens on the far end went away
impl<T: Send + 'static> Cancellable for Wire<T> {
    fn is_cancelled(&self) -> bool {
        is_cancelled::<T, _>(self.far.as_ref())
    }
}

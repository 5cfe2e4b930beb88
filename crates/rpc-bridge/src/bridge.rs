//! Bridges between push consumers and futures/streams
//!
//! Each bridge is a pair. The push half ([`OneBridge`], [`ManyBridge`]) is a
//! [`PushConsumer`](crate::consumer::PushConsumer) handed to a transport, the
//! pull half ([`OneReceiver`], [`ManyReceiver`]) is what the caller polls.
//!
//! The other direction, driving a future or a stream into a push consumer, is
//! covered by [`forward_one`] and [`forward_many`].
use std::sync::atomic::{AtomicBool, Ordering};

mod many;
mod one;
pub use many::*;
pub use one::*;

/// Open until the first terminal signal wins it
#[derive(Debug, Default)]
pub(crate) struct TerminalFlag(AtomicBool);

impl TerminalFlag {
    /// Only the caller that moves the flag from open to terminated gets `true`
    pub(crate) fn try_terminate(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
    pub(crate) fn is_terminated(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// How a forwarding loop ended
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ForwardOutcome {
    /// the source finished and `on_completed` was pushed
    Completed,
    /// the source failed and `on_error` was pushed
    Failed,
    /// the consumer was cancelled, nothing more was pushed
    Cancelled,
}

//! Call shape wrappers
//!
//! | shape | client | server |
//! |---|---|---|
//! | unary to unary | [`client::one_to_one`] | [`server::one_to_one`] |
//! | unary to stream | [`client::one_to_many`] | [`server::one_to_many`] |
//! | stream to unary | [`client::many_to_one`] | [`server::many_to_one`] |
//! | stream to stream | [`client::many_to_many`] | [`server::many_to_many`] |
//!
//! No wrapper lets a failure escape. A panic while calling the transport or
//! the service, or while polling what the service returned, turns into one
//! `on_error` on the consumer that would otherwise never see a terminal signal.
use std::panic::AssertUnwindSafe;

use futures::{FutureExt, Stream, StreamExt};
use tokio::runtime::{Handle, TryCurrentError};

use crate::Error;

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "server")]
pub mod server;

/// Where a request stream is driven when it is forwarded into a transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RequestExecutor {
    /// tokio's blocking pool, for transports whose `on_next` may block
    #[default]
    Blocking,
    /// a regular tokio task, for transports that never block
    Spawn,
}

impl RequestExecutor {
    pub(crate) fn execute<F>(self, handle: &Handle, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self {
            RequestExecutor::Blocking => {
                let runtime = handle.clone();
                handle.spawn_blocking(move || runtime.block_on(future));
            }
            RequestExecutor::Spawn => {
                handle.spawn(future);
            }
        }
    }
}

pub(crate) fn runtime() -> Result<Handle, TryCurrentError> {
    Handle::try_current()
}

pub(crate) fn no_runtime(error: &TryCurrentError) -> Error {
    Error::Runtime(error.to_string())
}

/// Call `f`, turning a panic into [`Error::Panicked`]
pub(crate) fn invoke<R>(f: impl FnOnce() -> R) -> Result<R, Error> {
    std::panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let error = Error::from_panic(payload);
        tracing::warn!(%error, "invocation panicked");
        error
    })
}

pub(crate) fn catch_panic<F, T>(future: F) -> impl Future<Output = Result<T, Error>>
where
    F: Future<Output = Result<T, Error>>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .map(|result| result.unwrap_or_else(|payload| Err(panicked(payload))))
}

pub(crate) fn catch_panic_stream<S, T>(stream: S) -> impl Stream<Item = Result<T, Error>>
where
    S: Stream<Item = Result<T, Error>>,
{
    AssertUnwindSafe(stream)
        .catch_unwind()
        .map(|item| item.unwrap_or_else(|payload| Err(panicked(payload))))
}

fn panicked(payload: Box<dyn std::any::Any + Send>) -> Error {
    let error = Error::from_panic(payload);
    tracing::warn!(%error, "polling panicked");
    error
}

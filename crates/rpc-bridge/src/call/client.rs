//! Client side: drive a push-callback transport, get futures and streams back
//!
//! Transport calls are passed as closures, usually wrapping a generated stub
//! method. Unary-request calls take `(request, response_consumer)`, streaming
//! request calls take the response consumer and hand back the consumer the
//! transport reads requests from.
//!
//! Streaming-request calls forward the request stream on a tokio runtime: the
//! current one for the plain functions, an explicit [`Handle`] for the `*_on`
//! variants, which also work from threads outside any runtime.
use futures::{Stream, TryStreamExt, stream};
use tokio::runtime::{Handle, TryCurrentError};
use tracing::Instrument;

use super::{RequestExecutor, catch_panic_stream, invoke, no_runtime, runtime};
use crate::{
    Error,
    bridge::{ManyBridge, ManyReceiver, OneBridge, OneReceiver, forward_many, many, one},
    consumer::PushConsumer,
};

/// Unary request, unary response
///
/// Nothing happens until the returned future is polled. The request future is
/// awaited first, then the transport is called with a [`OneBridge`].
pub async fn one_to_one<REQ, RES, Q, F>(request: Q, call: F) -> Result<RES, Error>
where
    Q: Future<Output = Result<REQ, Error>>,
    F: FnOnce(REQ, OneBridge<RES>),
    RES: Send,
{
    let request = request.await?;
    let (bridge, receiver) = one();
    if let Err(error) = invoke(|| call(request, bridge.clone())) {
        bridge.on_error(error);
    }
    drop(bridge);
    receiver.await
}

/// Unary request, streaming response
///
/// Lazy like [`one_to_one`]. A failed request ends the stream with that error.
pub fn one_to_many<REQ, RES, Q, F>(request: Q, call: F) -> impl Stream<Item = Result<RES, Error>>
where
    Q: Future<Output = Result<REQ, Error>>,
    F: FnOnce(REQ, ManyBridge<RES>),
    RES: Send,
{
    stream::once(async move {
        let request = request.await?;
        let (bridge, receiver) = many();
        if let Err(error) = invoke(|| call(request, bridge.clone())) {
            bridge.on_error(error);
        }
        Ok::<_, Error>(receiver)
    })
    .try_flatten()
}

/// Streaming request, unary response, forwarding requests on the current
/// runtime with the default executor
pub fn many_to_one<REQ, RES, S, F, I>(requests: S, call: F) -> OneReceiver<RES>
where
    S: Stream<Item = Result<REQ, Error>> + Send + 'static,
    F: FnOnce(OneBridge<RES>) -> I,
    I: PushConsumer<REQ> + 'static,
    REQ: Send + 'static,
    RES: Send,
{
    start_many_to_one(runtime(), RequestExecutor::default(), requests, call)
}

/// Streaming request, unary response
///
/// The transport is called right away. The request stream is then driven on
/// `executor` of the runtime behind `handle` and forwarded into the consumer
/// the transport returned, with a cancellation check before every request.
pub fn many_to_one_on<REQ, RES, S, F, I>(
    handle: &Handle,
    executor: RequestExecutor,
    requests: S,
    call: F,
) -> OneReceiver<RES>
where
    S: Stream<Item = Result<REQ, Error>> + Send + 'static,
    F: FnOnce(OneBridge<RES>) -> I,
    I: PushConsumer<REQ> + 'static,
    REQ: Send + 'static,
    RES: Send,
{
    start_many_to_one(Ok(handle.clone()), executor, requests, call)
}

fn start_many_to_one<REQ, RES, S, F, I>(
    runtime: Result<Handle, TryCurrentError>,
    executor: RequestExecutor,
    requests: S,
    call: F,
) -> OneReceiver<RES>
where
    S: Stream<Item = Result<REQ, Error>> + Send + 'static,
    F: FnOnce(OneBridge<RES>) -> I,
    I: PushConsumer<REQ> + 'static,
    REQ: Send + 'static,
    RES: Send,
{
    let (bridge, receiver) = one();
    let inbound = match invoke(|| call(bridge.clone())) {
        Ok(inbound) => inbound,
        Err(error) => {
            bridge.on_error(error);
            return receiver;
        }
    };
    if let Err(error) = forward_requests(runtime, executor, requests, inbound, "many_to_one") {
        bridge.on_error(error);
    }
    receiver
}

/// Streaming request, streaming response, forwarding requests on the current
/// runtime with the default executor
pub fn many_to_many<REQ, RES, S, F, I>(requests: S, call: F) -> ManyReceiver<RES>
where
    S: Stream<Item = Result<REQ, Error>> + Send + 'static,
    F: FnOnce(ManyBridge<RES>) -> I,
    I: PushConsumer<REQ> + 'static,
    REQ: Send + 'static,
    RES: Send,
{
    start_many_to_many(runtime(), RequestExecutor::default(), requests, call)
}

/// Streaming request, streaming response
///
/// Same request handling as [`many_to_one_on`]. The responses and the requests
/// travel independently, there is no ordering between the two.
pub fn many_to_many_on<REQ, RES, S, F, I>(
    handle: &Handle,
    executor: RequestExecutor,
    requests: S,
    call: F,
) -> ManyReceiver<RES>
where
    S: Stream<Item = Result<REQ, Error>> + Send + 'static,
    F: FnOnce(ManyBridge<RES>) -> I,
    I: PushConsumer<REQ> + 'static,
    REQ: Send + 'static,
    RES: Send,
{
    start_many_to_many(Ok(handle.clone()), executor, requests, call)
}

fn start_many_to_many<REQ, RES, S, F, I>(
    runtime: Result<Handle, TryCurrentError>,
    executor: RequestExecutor,
    requests: S,
    call: F,
) -> ManyReceiver<RES>
where
    S: Stream<Item = Result<REQ, Error>> + Send + 'static,
    F: FnOnce(ManyBridge<RES>) -> I,
    I: PushConsumer<REQ> + 'static,
    REQ: Send + 'static,
    RES: Send,
{
    let (bridge, receiver) = many();
    let inbound = match invoke(|| call(bridge.clone())) {
        Ok(inbound) => inbound,
        Err(error) => {
            bridge.on_error(error);
            return receiver;
        }
    };
    if let Err(error) = forward_requests(runtime, executor, requests, inbound, "many_to_many") {
        bridge.on_error(error);
    }
    receiver
}

/// Forward `requests` into `inbound` on `executor`
///
/// Without a runtime the inbound consumer gets the error too, so the transport
/// can tear the call down.
fn forward_requests<REQ, S, I>(
    runtime: Result<Handle, TryCurrentError>,
    executor: RequestExecutor,
    requests: S,
    inbound: I,
    shape: &'static str,
) -> Result<(), Error>
where
    S: Stream<Item = Result<REQ, Error>> + Send + 'static,
    I: PushConsumer<REQ> + 'static,
    REQ: Send + 'static,
{
    let handle = match runtime {
        Ok(handle) => handle,
        Err(error) => {
            inbound.on_error(no_runtime(&error));
            return Err(no_runtime(&error));
        }
    };
    let span = tracing::debug_span!("client_requests", shape, ?executor);
    let forward = async move {
        let outcome = forward_many(catch_panic_stream(requests), inbound).await;
        tracing::debug!(?outcome, "request stream forwarded");
    };
    executor.execute(&handle, forward.instrument(span));
    Ok(())
}

//! Server side: implement a push-callback service with futures and streams
//!
//! The transport hands over the request (a value, or nothing for streaming
//! requests) and the outbound consumer. The wrapper calls the service, spawns
//! a task that forwards whatever the service returned into the outbound
//! consumer, and returns without waiting.
//!
//! The plain wrappers spawn on the runtime they are called from. A transport
//! calling in from its own I/O thread uses the `*_on` variants with a
//! [`Handle`] to the runtime that should drive the call.
//!
//! ```rust,no_run
//! # use rpc_bridge::{Error, bridge::OneBridge, server};
//! # fn handle(outbound: OneBridge<u64>) {
//! server::one_to_one(21_u64, outbound, |request| async move {
//!     Ok::<_, Error>(request.await? * 2)
//! });
//! # }
//! ```
use futures::{Stream, future};
use tokio::runtime::Handle;
use tracing::Instrument;

use super::{catch_panic, catch_panic_stream, invoke, no_runtime, runtime};
use crate::{
    Error,
    bridge::{ManyBridge, ManyReceiver, forward_many, forward_one, many},
    consumer::PushConsumer,
};

/// The unary request as the service sees it
pub type UnaryRequest<REQ> = future::Ready<Result<REQ, Error>>;

/// Unary request, unary response, on the current runtime
pub fn one_to_one<REQ, RES, O, F, Fut>(request: REQ, outbound: O, service: F)
where
    O: PushConsumer<RES> + 'static,
    F: FnOnce(UnaryRequest<REQ>) -> Fut,
    Fut: Future<Output = Result<RES, Error>> + Send + 'static,
    RES: Send + 'static,
{
    match runtime() {
        Ok(handle) => one_to_one_on(&handle, request, outbound, service),
        Err(error) => outbound.on_error(no_runtime(&error)),
    }
}

/// Unary request, unary response
///
/// The service is called with `handle` entered, so it may spawn tasks itself.
pub fn one_to_one_on<REQ, RES, O, F, Fut>(handle: &Handle, request: REQ, outbound: O, service: F)
where
    O: PushConsumer<RES> + 'static,
    F: FnOnce(UnaryRequest<REQ>) -> Fut,
    Fut: Future<Output = Result<RES, Error>> + Send + 'static,
    RES: Send + 'static,
{
    let _enter = handle.enter();
    let response = match invoke(|| service(future::ready(Ok(request)))) {
        Ok(response) => response,
        Err(error) => return outbound.on_error(error),
    };
    let span = tracing::debug_span!("server_call", shape = "one_to_one");
    handle.spawn(
        async move {
            let outcome = forward_one(catch_panic(response), outbound).await;
            tracing::debug!(?outcome, "response forwarded");
        }
        .instrument(span),
    );
}

/// Unary request, streaming response, on the current runtime
pub fn one_to_many<REQ, RES, O, F, S>(request: REQ, outbound: O, service: F)
where
    O: PushConsumer<RES> + 'static,
    F: FnOnce(UnaryRequest<REQ>) -> S,
    S: Stream<Item = Result<RES, Error>> + Send + 'static,
    RES: Send + 'static,
{
    match runtime() {
        Ok(handle) => one_to_many_on(&handle, request, outbound, service),
        Err(error) => outbound.on_error(no_runtime(&error)),
    }
}

/// Unary request, streaming response
///
/// Every response is checked against the outbound consumer's cancellation
/// before it is pushed; a cancelled call stops the forwarding and drops the
/// service stream.
pub fn one_to_many_on<REQ, RES, O, F, S>(handle: &Handle, request: REQ, outbound: O, service: F)
where
    O: PushConsumer<RES> + 'static,
    F: FnOnce(UnaryRequest<REQ>) -> S,
    S: Stream<Item = Result<RES, Error>> + Send + 'static,
    RES: Send + 'static,
{
    let _enter = handle.enter();
    let responses = match invoke(|| service(future::ready(Ok(request)))) {
        Ok(responses) => responses,
        Err(error) => return outbound.on_error(error),
    };
    let span = tracing::debug_span!("server_call", shape = "one_to_many");
    handle.spawn(
        async move {
            let outcome = forward_many(catch_panic_stream(responses), outbound).await;
            tracing::debug!(?outcome, "response stream forwarded");
        }
        .instrument(span),
    );
}

/// Streaming request, unary response, on the current runtime
pub fn many_to_one<REQ, RES, O, F, Fut>(outbound: O, service: F) -> ManyBridge<REQ>
where
    O: PushConsumer<RES> + 'static,
    F: FnOnce(ManyReceiver<REQ>) -> Fut,
    Fut: Future<Output = Result<RES, Error>> + Send + 'static,
    REQ: Send,
    RES: Send + 'static,
{
    match runtime() {
        Ok(handle) => many_to_one_on(&handle, outbound, service),
        Err(error) => refuse(outbound, no_runtime(&error)),
    }
}

/// Streaming request, unary response
///
/// Returns the consumer the transport should push requests into. The service
/// reads them from the [`ManyReceiver`] it is given.
pub fn many_to_one_on<REQ, RES, O, F, Fut>(handle: &Handle, outbound: O, service: F) -> ManyBridge<REQ>
where
    O: PushConsumer<RES> + 'static,
    F: FnOnce(ManyReceiver<REQ>) -> Fut,
    Fut: Future<Output = Result<RES, Error>> + Send + 'static,
    REQ: Send,
    RES: Send + 'static,
{
    let _enter = handle.enter();
    let (inbound, requests) = many();
    let response = match invoke(|| service(requests)) {
        Ok(response) => response,
        Err(error) => {
            outbound.on_error(error);
            return inbound;
        }
    };
    let span = tracing::debug_span!("server_call", shape = "many_to_one");
    handle.spawn(
        async move {
            let outcome = forward_one(catch_panic(response), outbound).await;
            tracing::debug!(?outcome, "response forwarded");
        }
        .instrument(span),
    );
    inbound
}

/// Streaming request, streaming response, on the current runtime
pub fn many_to_many<REQ, RES, O, F, S>(outbound: O, service: F) -> ManyBridge<REQ>
where
    O: PushConsumer<RES> + 'static,
    F: FnOnce(ManyReceiver<REQ>) -> S,
    S: Stream<Item = Result<RES, Error>> + Send + 'static,
    REQ: Send,
    RES: Send + 'static,
{
    match runtime() {
        Ok(handle) => many_to_many_on(&handle, outbound, service),
        Err(error) => refuse(outbound, no_runtime(&error)),
    }
}

/// Streaming request, streaming response
pub fn many_to_many_on<REQ, RES, O, F, S>(handle: &Handle, outbound: O, service: F) -> ManyBridge<REQ>
where
    O: PushConsumer<RES> + 'static,
    F: FnOnce(ManyReceiver<REQ>) -> S,
    S: Stream<Item = Result<RES, Error>> + Send + 'static,
    REQ: Send,
    RES: Send + 'static,
{
    let _enter = handle.enter();
    let (inbound, requests) = many();
    let responses = match invoke(|| service(requests)) {
        Ok(responses) => responses,
        Err(error) => {
            outbound.on_error(error);
            return inbound;
        }
    };
    let span = tracing::debug_span!("server_call", shape = "many_to_many");
    handle.spawn(
        async move {
            let outcome = forward_many(catch_panic_stream(responses), outbound).await;
            tracing::debug!(?outcome, "response stream forwarded");
        }
        .instrument(span),
    );
    inbound
}

/// Fail the call and hand back an inbound consumer that reports cancelled
fn refuse<REQ: Send, RES>(outbound: impl PushConsumer<RES>, error: Error) -> ManyBridge<REQ> {
    outbound.on_error(error);
    let (inbound, _requests) = many();
    inbound
}

#[cfg(test)]
mod tests {
    use futures::{StreamExt, TryStreamExt};

    use super::*;
    use crate::{bridge::one, consumer::is_cancelled};

    #[test]
    fn no_runtime_is_reported_to_the_outbound() {
        let (outbound, response) = one::<u32>();
        one_to_one(1_u32, outbound, |request| async move { request.await });
        let response = futures::executor::block_on(response);
        assert!(matches!(response, Err(Error::Runtime(_))));
    }

    #[test]
    fn streaming_call_without_runtime_refuses_requests() {
        let (outbound, response) = one::<u32>();
        let inbound = many_to_one(outbound, |requests: ManyReceiver<u32>| {
            requests.try_fold(0, |sum, n| async move { Ok(sum + n) })
        });
        assert!(is_cancelled(&inbound));
        let response = futures::executor::block_on(response);
        assert!(matches!(response, Err(Error::Runtime(_))));
    }

    #[tokio::test]
    async fn panicking_service_cancels_the_inbound() {
        let (outbound, response) = one::<u32>();
        let inbound = many_to_one(outbound, |_requests: ManyReceiver<u32>| {
            if true {
                panic!("service refused");
            }
            async { Ok(0) }
        });
        assert!(is_cancelled(&inbound));
        assert!(matches!(response.await, Err(Error::Panicked(_))));
    }

    #[tokio::test]
    async fn service_reads_requests_from_the_inbound() {
        let (outbound, responses) = many::<String>();
        let inbound = many_to_many(outbound, |requests: ManyReceiver<u32>| {
            requests.map(|request| request.map(|n| format!("#{n}")))
        });
        inbound.on_next(1);
        inbound.on_next(2);
        inbound.on_completed();
        let responses = responses
            .map(|item| item.expect("no error"))
            .collect::<Vec<_>>()
            .await;
        assert_eq!(responses, vec!["#1".to_string(), "#2".to_string()]);
    }
}

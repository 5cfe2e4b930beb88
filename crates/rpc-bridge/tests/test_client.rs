use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use futures::{StreamExt, stream};
use rpc_bridge::{
    Error, ManyBridge, OneBridge, PushConsumer, RequestExecutor, client,
    consumer::{FnConsumer, WithCancellation},
};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
mod common;
use common::{DropFlag, Event, recorder, values};

/// Stands in for a transport's inbound consumer that answers once the request
/// stream completes
struct Summing {
    sum: AtomicU64,
    response: OneBridge<u64>,
}

impl PushConsumer<u64> for Summing {
    fn on_next(&self, value: u64) {
        self.sum.fetch_add(value, Ordering::SeqCst);
    }
    fn on_error(&self, error: Error) {
        self.response.on_error(error);
    }
    fn on_completed(&self) {
        self.response.on_next(self.sum.load(Ordering::SeqCst));
        self.response.on_completed();
    }
}

#[tokio::test]
async fn unary_call_resolves_from_transport_thread() -> anyhow::Result<()> {
    let response = client::one_to_one(async { Ok(42_u64) }, |request, response: OneBridge<u64>| {
        std::thread::spawn(move || {
            response.on_next(request * 2);
            response.on_completed();
        });
    })
    .await?;
    assert_eq!(response, 84);
    Ok(())
}

#[tokio::test]
async fn unary_completion_without_value_never_settles() {
    let pending = client::one_to_one(async { Ok(1_u64) }, |_request, response: OneBridge<u64>| {
        response.on_completed();
    });
    let waited = tokio::time::timeout(Duration::from_millis(100), pending).await;
    assert!(waited.is_err());
}

#[tokio::test]
async fn transport_panic_becomes_the_response_error() {
    let result = client::one_to_one(async { Ok(1_u64) }, |_request, _response: OneBridge<u64>| {
        panic!("stub not connected");
    })
    .await;
    assert!(matches!(result, Err(Error::Panicked(message)) if message == "stub not connected"));
}

#[tokio::test]
async fn server_streaming_yields_values_then_ends() -> anyhow::Result<()> {
    let responses = client::one_to_many(async { Ok(3_u32) }, |count, response: ManyBridge<u32>| {
        std::thread::spawn(move || {
            for n in 1..=count {
                response.on_next(n);
            }
            response.on_completed();
        });
    })
    .map(|item| item.map_err(anyhow::Error::from))
    .collect::<Vec<_>>()
    .await
    .into_iter()
    .collect::<anyhow::Result<Vec<_>>>()?;
    assert_eq!(responses, vec![1, 2, 3]);
    Ok(())
}

#[tokio::test]
async fn client_streaming_sums_on_blocking_pool() -> anyhow::Result<()> {
    let requests = stream::iter([1_u64, 2, 3]).map(Ok);
    let total = client::many_to_one(requests, |response| Summing {
        sum: AtomicU64::new(0),
        response,
    })
    .await?;
    assert_eq!(total, 6);
    Ok(())
}

#[tokio::test]
async fn request_stream_forwarded_for_a_caller_outside_the_runtime() -> anyhow::Result<()> {
    let handle = Handle::current();
    let response = std::thread::spawn(move || {
        let requests = stream::iter([1_u64, 2, 3]).map(Ok);
        client::many_to_one_on(&handle, RequestExecutor::Blocking, requests, |response| {
            Summing {
                sum: AtomicU64::new(0),
                response,
            }
        })
    })
    .join()
    .map_err(|_| anyhow::anyhow!("caller thread panicked"))?;
    assert_eq!(response.await?, 6);
    Ok(())
}

#[tokio::test]
async fn blocking_transport_consumer_does_not_stall_the_runtime() -> anyhow::Result<()> {
    let requests = stream::iter([1_u64, 2, 3]).map(Ok);
    let response = client::many_to_one(requests, |response| {
        let summing = Summing {
            sum: AtomicU64::new(0),
            response,
        };
        FnConsumer::new(
            move |value: u64| {
                // a transport writing synchronously to a slow socket
                std::thread::sleep(Duration::from_millis(20));
                summing.on_next(value);
                if value == 3 {
                    summing.on_completed();
                }
            },
            |_error: Error| {},
            || {},
        )
    });
    // the current-thread runtime keeps running other tasks meanwhile
    let ticker = tokio::spawn(async {
        tokio::time::sleep(Duration::from_millis(1)).await;
    });
    ticker.await?;
    assert_eq!(response.await?, 6);
    Ok(())
}

#[tokio::test]
async fn request_stream_error_reaches_the_transport() {
    let (inbound, mut recording) = recorder::<u64>();
    let requests = stream::iter([Ok(1_u64), Ok(2), Err(Error::internal("bad request"))]);
    let _response = client::many_to_one(requests, |_response: OneBridge<u64>| inbound);
    let events = recording.until_terminal().await;
    assert_eq!(values(&events), vec![1, 2]);
    assert!(matches!(events.last(), Some(Event::Error(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_transport_stops_the_request_stream() {
    let (inner, mut recording) = recorder::<u64>();
    let ct = CancellationToken::new();
    let inbound = WithCancellation::new(inner, ct.clone());
    let flag = DropFlag::default();
    let guard = flag.guard();
    let requests = stream::unfold((0_u64, guard), |(n, guard)| async move {
        tokio::task::yield_now().await;
        Some((Ok(n), (n + 1, guard)))
    });
    let _response = client::many_to_one_on(
        &Handle::current(),
        RequestExecutor::Spawn,
        requests,
        |_response: OneBridge<u64>| inbound,
    );
    for _ in 0..2 {
        assert!(matches!(recording.next().await, Some(Event::Next(_))));
    }
    ct.cancel();
    flag.wait_dropped().await;
    let rest = recording.drain_for(Duration::from_millis(100)).await;
    assert!(rest.iter().all(|event| !event.is_terminal()));
}

#[tokio::test]
async fn bidi_streaming_echoes_through_the_transport() -> anyhow::Result<()> {
    let requests = stream::iter(["a", "b", "c"]).map(|s| Ok(s.to_string()));
    let responses = client::many_to_many_on(
        &Handle::current(),
        RequestExecutor::Spawn,
        requests,
        |response: ManyBridge<String>| {
            let (next, error, completed) = (response.clone(), response.clone(), response);
            FnConsumer::new(
                move |request: String| next.on_next(request.to_uppercase()),
                move |e: Error| error.on_error(e),
                move || completed.on_completed(),
            )
        },
    );
    let responses = responses
        .map(|item| item.map_err(anyhow::Error::from))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<anyhow::Result<Vec<_>>>()?;
    assert_eq!(responses, vec!["A", "B", "C"]);
    Ok(())
}

#[tokio::test]
async fn transport_panic_ends_the_response_stream() {
    let requests = stream::iter([Ok(1_u64)]);
    let mut responses = client::many_to_many(requests, |_response: ManyBridge<u64>| {
        if true {
            panic!("stub not connected");
        }
        FnConsumer::new(|_: u64| {}, |_: Error| {}, || {})
    });
    assert!(matches!(responses.next().await, Some(Err(Error::Panicked(_)))));
    assert!(responses.next().await.is_none());
}

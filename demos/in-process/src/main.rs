use std::time::Duration;

use anyhow::Result;
use common::{calculator::Calculator, stub::CalculatorStub};
use futures::{StreamExt, TryStreamExt, stream};
use rpc_bridge::{ManyBridge, client, consumer::WithCancellation};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{self, EnvFilter};
mod common;

/// cargo run -p rpc-bridge-demo --bin in_process
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let stub = CalculatorStub::new(Calculator);

    let doubled =
        client::one_to_one(async { Ok(21) }, |n, response| stub.double(n, response)).await?;
    tracing::info!(doubled, "unary");

    let counted: Vec<u32> =
        client::one_to_many(async { Ok(5) }, |n, responses| stub.count_to(n, responses))
            .try_collect()
            .await?;
    tracing::info!(?counted, "server streaming");

    let total = client::many_to_one(stream::iter(1..=100_u64).map(Ok), |response| {
        stub.sum(response)
    })
    .await?;
    tracing::info!(total, "client streaming");

    let lines = ["push", "meets", "pull"].map(String::from);
    let shouted: Vec<String> = client::many_to_many(stream::iter(lines).map(Ok), |responses| {
        stub.shout(responses)
    })
    .try_collect()
    .await?;
    tracing::info!(?shouted, "bidi streaming");

    if let Err(error) =
        client::one_to_one(async { Ok(u64::MAX) }, |n, response| stub.double(n, response)).await
    {
        tracing::info!(%error, code = ?error.code(), "service refused");
    }

    let overflow = stream::iter([u64::MAX, 1]).map(Ok);
    if let Err(error) = client::many_to_one(overflow, |response| stub.sum(response)).await {
        tracing::info!(%error, code = ?error.code(), "service failed");
    }

    // Stop reading an endless count after a few values; the service notices
    // on its next push and drops its stream.
    let mut numbers = Box::pin(client::one_to_many(async { Ok(u32::MAX) }, |n, responses| {
        stub.count_to(n, responses)
    }));
    let mut first = vec![];
    while let Some(n) = numbers.try_next().await? {
        first.push(n);
        if first.len() == 3 {
            break;
        }
    }
    drop(numbers);
    tracing::info!(?first, "stopped reading");

    // A deadline on the request side: once the token fires the endless
    // request stream is no longer pulled.
    let deadline = CancellationToken::new();
    let requests = stream::repeat_with(|| Ok("tick".to_string())).then(|tick| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        tick
    });
    let mut echoes = client::many_to_many(requests, |responses: ManyBridge<String>| {
        WithCancellation::new(stub.shout(responses), deadline.clone())
    });
    let timer = tokio::spawn({
        let deadline = deadline.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            deadline.cancel();
        }
    });
    let mut echoed = 0;
    while let Ok(Some(Ok(_))) = tokio::time::timeout(Duration::from_millis(200), echoes.next()).await
    {
        echoed += 1;
    }
    timer.await?;
    tracing::info!(echoed, "requests stopped at the deadline");
    Ok(())
}

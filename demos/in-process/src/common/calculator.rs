use futures::{Stream, TryStreamExt, stream};
use rpc_bridge::{Error, ManyReceiver, consumer::BoxConsumer, server, server::UnaryRequest};

/// The callback-style service trait, shaped like generated stub code
pub trait CalculatorService: Send + Sync + 'static {
    fn double(&self, request: u64, response: BoxConsumer<u64>);
    fn count_to(&self, request: u32, responses: BoxConsumer<u32>);
    fn sum(&self, response: BoxConsumer<u64>) -> BoxConsumer<u64>;
    fn shout(&self, responses: BoxConsumer<String>) -> BoxConsumer<String>;
}

/// The same service written with futures and streams
#[derive(Debug, Clone, Default)]
pub struct Calculator;

impl Calculator {
    async fn double(request: UnaryRequest<u64>) -> Result<u64, Error> {
        let n = request.await?;
        n.checked_mul(2)
            .ok_or_else(|| Error::invalid_argument(format!("{n} is too large to double")))
    }

    fn count_to(request: UnaryRequest<u32>) -> impl Stream<Item = Result<u32, Error>> + Send {
        stream::once(request)
            .map_ok(|n| stream::iter((1..=n).map(Ok::<u32, Error>)))
            .try_flatten()
    }

    async fn sum(requests: ManyReceiver<u64>) -> Result<u64, Error> {
        requests
            .try_fold(0_u64, |sum, n| async move {
                sum.checked_add(n)
                    .ok_or_else(|| Error::service(format!("sum overflows after adding {n}")))
            })
            .await
    }

    fn shout(requests: ManyReceiver<String>) -> impl Stream<Item = Result<String, Error>> + Send {
        requests.map_ok(|line| line.to_uppercase())
    }
}

impl CalculatorService for Calculator {
    fn double(&self, request: u64, response: BoxConsumer<u64>) {
        server::one_to_one(request, response, Calculator::double)
    }

    fn count_to(&self, request: u32, responses: BoxConsumer<u32>) {
        server::one_to_many(request, responses, Calculator::count_to)
    }

    fn sum(&self, response: BoxConsumer<u64>) -> BoxConsumer<u64> {
        Box::new(server::many_to_one(response, Calculator::sum))
    }

    fn shout(&self, responses: BoxConsumer<String>) -> BoxConsumer<String> {
        Box::new(server::many_to_many(responses, Calculator::shout))
    }
}

#![doc = include_str!("../../../README.md")]
mod error;
pub use error::{BoxError, Code, Error};

/// Push-callback consumers and the cancellation probe
pub mod consumer;
pub use consumer::{Cancellable, PushConsumer};

pub mod bridge;
pub use bridge::{ManyBridge, ManyReceiver, OneBridge, OneReceiver};

pub mod call;
pub use call::RequestExecutor;
#[cfg(feature = "client")]
pub use call::client;
#[cfg(feature = "server")]
pub use call::server;

/// A boxed single-value source, for service traits that need a nameable type
pub type PullOne<T> = futures::future::BoxFuture<'static, Result<T, Error>>;
/// A boxed multi-value source, for service traits that need a nameable type
pub type PullMany<T> = futures::stream::BoxStream<'static, Result<T, Error>>;

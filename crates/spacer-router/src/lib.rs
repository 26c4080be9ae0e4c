//! # Spacer Router
//!
//! Bridges Kafka topics and HTTP-invoked handlers.
//!
//! Inbound, a [`ConsumerLoop`] consumes every topic of the configured
//! applications, looks up the handler for `"<topic>:UPDATE"` in a static
//! [`RouteTable`] and posts the message value to it. The offset is committed
//! only after the handler answered `200 OK`, so delivery is at least once
//! and a slow handler slows its partition down.
//!
//! Outbound, the write proxy accepts batches of key/value entries over HTTP
//! and republishes each entry as a message through the [`ProducerBridge`].
//!
//! Broker access goes through the [`MessageSource`], [`Publisher`] and
//! [`MetadataSource`] traits; the `kafka` feature provides the rdkafka
//! implementations.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod consumer;
pub mod error;
pub mod invoke;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod message;
pub mod metadata;
pub mod metrics;
pub mod producer;
pub mod proxy;
pub mod rebalance;
pub mod route;

pub use config::{RouterConfig, UnroutedPolicy};
pub use consumer::{ConsumerLoop, DispatchOutcome, MessageSource, SourceEvent};
pub use error::{RouterError, RouterResult};
pub use invoke::{HttpInvoker, InvokeError, Invoker};
pub use message::{DeliveryAck, InboundMessage, Message};
pub use metadata::{MetadataRefresher, MetadataSource};
pub use metrics::{ConsumerMetrics, ProducerMetrics};
pub use producer::{drain_acknowledgments, ProducerBridge, ProducerHandle, PublishError, Publisher};
pub use proxy::{WriteProxyState, WriteRequest};
pub use route::RouteTable;

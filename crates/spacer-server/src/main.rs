//! Spacer router process.
//!
//! Wires the consumer loop, the write proxy, the producer bridge, the
//! delivery report drain and the metadata refresher into one process and
//! supervises them. Configuration comes from the file named by
//! `SPACER_CONFIG` plus `SPACER_*` overrides.

mod lifecycle;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use spacer_router::kafka::{KafkaMessageSource, KafkaPublisher};
use spacer_router::metrics::ConsumerMetrics;
use spacer_router::{
    drain_acknowledgments, proxy, ConsumerLoop, HttpInvoker, MetadataRefresher, ProducerBridge,
    RouterConfig, WriteProxyState,
};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// How long tasks get to stop after cancellation.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = RouterConfig::load()?;
    logging::init(&config.logging);

    let group_id = config.group_id();
    info!(
        app_name = %config.app_name,
        brokers = %config.kafka.brokers,
        group_id = %group_id,
        delegator_url = %config.delegator_url,
        "starting spacer router"
    );

    let routes = Arc::new(config.route_table()?);
    info!(routes = routes.len(), "route table loaded");

    // Consumer side.
    let source =
        KafkaMessageSource::connect(&config.kafka, &group_id, &routes.subscription_patterns())?;
    let refresher = MetadataRefresher::new(
        source.metadata(),
        config.metadata.refresh_interval(),
        config.metadata.timeout(),
    );
    let invoker = Arc::new(HttpInvoker::new(config.invoker.request_timeout())?);
    let consumer_metrics = Arc::new(ConsumerMetrics::new());
    let consumer = ConsumerLoop::new(source, invoker, Arc::clone(&routes))
        .with_unrouted_policy(config.kafka.unrouted)
        .with_metrics(Arc::clone(&consumer_metrics));

    // Producer side.
    let (publisher, acks) = KafkaPublisher::connect(&config.kafka)?;
    let (bridge, producer) = ProducerBridge::new(publisher, config.write_proxy.channel_capacity);
    let bridge = bridge.with_retry_backoff(config.kafka.producer_retry_backoff());
    let producer_metrics = Arc::clone(bridge.metrics());

    let listener = TcpListener::bind(config.write_proxy.listen.as_str()).await?;
    let proxy_state = WriteProxyState::new(
        &config.app_name,
        producer,
        config.write_proxy.max_body_bytes,
    );

    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();
    lifecycle::spawn_named(&mut tasks, "consumer", consumer.run(cancel.clone()));
    lifecycle::spawn_named(&mut tasks, "producer", bridge.run(cancel.clone()));
    lifecycle::spawn_named(
        &mut tasks,
        "delivery-reports",
        drain_acknowledgments(acks, Arc::clone(&producer_metrics)),
    );
    lifecycle::spawn_named(&mut tasks, "metadata", refresher.run(cancel.clone()));
    lifecycle::spawn_named(
        &mut tasks,
        "write-proxy",
        proxy::serve(listener, proxy_state, cancel.clone()),
    );

    let result = lifecycle::supervise(tasks, cancel, SHUTDOWN_GRACE).await;

    let consumed = consumer_metrics.snapshot();
    let produced = producer_metrics.snapshot();
    info!(
        received = consumed.received,
        invoked = consumed.invoked,
        committed = consumed.committed,
        invoke_failures = consumed.invoke_failures,
        commit_failures = consumed.commit_failures,
        unrouted = consumed.unrouted,
        submitted = produced.submitted,
        delivered = produced.delivered,
        delivery_failures = produced.delivery_failures,
        "spacer router stopped"
    );

    result.map_err(Into::into)
}

//! Kafka bindings for the router seams.
//!
//! - [`KafkaMessageSource`]: [`crate::consumer::MessageSource`] over a
//!   `StreamConsumer` with manual commits
//! - [`KafkaPublisher`]: [`crate::producer::Publisher`] over a
//!   `ThreadedProducer` whose delivery callback feeds an ack channel
//! - [`KafkaMetadata`]: [`crate::metadata::MetadataSource`] over the
//!   consumer's client

mod consumer;
mod context;
mod metadata;
mod producer;

pub use consumer::KafkaMessageSource;
pub use context::{RouterConsumerContext, RouterProducerContext};
pub use metadata::KafkaMetadata;
pub use producer::KafkaPublisher;

use rdkafka::ClientConfig;

use crate::config::KafkaConfig;

/// Client configuration for the consumer.
///
/// Auto-commit is always disabled: offsets are committed only after the
/// handler answered success.
#[must_use]
pub fn consumer_client_config(config: &KafkaConfig, group_id: &str) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", &config.brokers)
        .set("group.id", group_id)
        .set("session.timeout.ms", config.session_timeout_ms.to_string())
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", &config.auto_offset_reset)
        .set("metadata.max.age.ms", config.metadata_max_age_ms.to_string())
        .set(
            "enable.partition.eof",
            if config.enable_partition_eof {
                "true"
            } else {
                "false"
            },
        );
    for (key, value) in &config.properties {
        client.set(key, value);
    }
    client
}

/// Client configuration for the producer.
#[must_use]
pub fn producer_client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    client.set("bootstrap.servers", &config.brokers);
    for (key, value) in &config.properties {
        client.set(key, value);
    }
    client
}

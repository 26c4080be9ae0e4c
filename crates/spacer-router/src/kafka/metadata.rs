use std::sync::Arc;
use std::time::Duration;

use rdkafka::consumer::{Consumer, StreamConsumer};

use super::context::RouterConsumerContext;
use crate::error::{RouterError, RouterResult};
use crate::metadata::MetadataSource;

/// Cluster topic listing through the consumer's client.
#[derive(Clone)]
pub struct KafkaMetadata {
    consumer: Arc<StreamConsumer<RouterConsumerContext>>,
}

impl KafkaMetadata {
    pub(super) fn new(consumer: Arc<StreamConsumer<RouterConsumerContext>>) -> Self {
        Self { consumer }
    }
}

impl MetadataSource for KafkaMetadata {
    fn topic_names(&self, timeout: Duration) -> RouterResult<Vec<String>> {
        let metadata = self
            .consumer
            .fetch_metadata(None, timeout)
            .map_err(|e| RouterError::Broker(format!("metadata request failed: {e}")))?;
        Ok(metadata
            .topics()
            .iter()
            .map(|t| t.name().to_string())
            .collect())
    }
}

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::BorrowedMessage;
use rdkafka::{Message as _, Offset, TopicPartitionList};
use tracing::info;

use super::context::RouterConsumerContext;
use super::metadata::KafkaMetadata;
use crate::config::KafkaConfig;
use crate::consumer::{MessageSource, SourceEvent};
use crate::error::{RouterError, RouterResult};
use crate::message::InboundMessage;

/// Pattern-subscribed consumer with manual, synchronous commits.
pub struct KafkaMessageSource {
    consumer: Arc<StreamConsumer<RouterConsumerContext>>,
    pending: Arc<Mutex<VecDeque<SourceEvent>>>,
    poll_timeout: Duration,
    seek_timeout: Duration,
}

impl KafkaMessageSource {
    /// Creates the consumer and subscribes to `patterns`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Broker`] if the client cannot be created or
    /// the subscription is rejected.
    pub fn connect(
        config: &KafkaConfig,
        group_id: &str,
        patterns: &[String],
    ) -> RouterResult<Self> {
        let pending = Arc::new(Mutex::new(VecDeque::new()));
        let consumer: StreamConsumer<RouterConsumerContext> =
            super::consumer_client_config(config, group_id)
                .create_with_context(RouterConsumerContext::new(Arc::clone(&pending)))
                .map_err(|e| RouterError::Broker(format!("failed to create consumer: {e}")))?;

        let topics: Vec<&str> = patterns.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topics)
            .map_err(|e| RouterError::Broker(format!("failed to subscribe: {e}")))?;

        info!(
            brokers = %config.brokers,
            group_id,
            patterns = ?patterns,
            "kafka consumer subscribed"
        );

        Ok(Self {
            consumer: Arc::new(consumer),
            pending,
            poll_timeout: config.poll_timeout(),
            seek_timeout: config.seek_timeout(),
        })
    }

    /// Metadata view sharing this consumer's client.
    #[must_use]
    pub fn metadata(&self) -> KafkaMetadata {
        KafkaMetadata::new(Arc::clone(&self.consumer))
    }
}

fn detach(msg: &BorrowedMessage<'_>) -> InboundMessage {
    InboundMessage {
        topic: msg.topic().to_string(),
        partition: msg.partition(),
        offset: msg.offset(),
        key: msg.key().map(Bytes::copy_from_slice),
        value: msg.payload().map(Bytes::copy_from_slice),
    }
}

/// Maps one bounded `recv` to an event. `None` means the poll timed out.
///
/// End of partition is informational; every other client error is fatal.
fn classify(polled: Option<Result<InboundMessage, KafkaError>>) -> RouterResult<SourceEvent> {
    match polled {
        None => Ok(SourceEvent::Idle),
        Some(Ok(msg)) => Ok(SourceEvent::Message(msg)),
        Some(Err(KafkaError::PartitionEOF(partition))) => Ok(SourceEvent::PartitionEof {
            topic: None,
            partition,
        }),
        Some(Err(e)) => Err(RouterError::Broker(e.to_string())),
    }
}

#[async_trait]
impl MessageSource for KafkaMessageSource {
    async fn poll(&mut self) -> RouterResult<SourceEvent> {
        let queued = self.pending.lock().pop_front();
        if let Some(event) = queued {
            return Ok(event);
        }

        let polled = tokio::time::timeout(self.poll_timeout, self.consumer.recv())
            .await
            .ok()
            .map(|res| res.map(|msg| detach(&msg)));
        classify(polled)
    }

    fn commit(&self, msg: &InboundMessage) -> RouterResult<()> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(&msg.topic, msg.partition, Offset::Offset(msg.commit_offset()))
            .map_err(|e| RouterError::Broker(format!("invalid commit offset: {e}")))?;
        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(|e| RouterError::Broker(format!("commit failed: {e}")))
    }

    fn rewind(&self, msg: &InboundMessage) -> RouterResult<()> {
        self.consumer
            .seek(
                &msg.topic,
                msg.partition,
                Offset::Offset(msg.offset),
                self.seek_timeout,
            )
            .map_err(|e| RouterError::Broker(format!("seek failed: {e}")))
    }
}

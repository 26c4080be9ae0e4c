use std::time::Duration;

use rdkafka::error::KafkaError;
use rdkafka::producer::{BaseRecord, Producer, ThreadedProducer};
use rdkafka::types::RDKafkaErrorCode;
use tokio::sync::mpsc;
use tracing::info;

use super::context::RouterProducerContext;
use crate::config::KafkaConfig;
use crate::error::{RouterError, RouterResult};
use crate::message::{DeliveryAck, Message};
use crate::producer::{PublishError, Publisher};

/// Producer whose delivery reports arrive on the returned ack receiver.
pub struct KafkaPublisher {
    producer: ThreadedProducer<RouterProducerContext>,
}

impl KafkaPublisher {
    /// Creates the producer.
    ///
    /// The ack receiver yields one [`DeliveryAck`] per published message and
    /// closes once the publisher is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Broker`] if the client cannot be created.
    pub fn connect(
        config: &KafkaConfig,
    ) -> RouterResult<(Self, mpsc::UnboundedReceiver<DeliveryAck>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let producer: ThreadedProducer<RouterProducerContext> =
            super::producer_client_config(config)
                .create_with_context(RouterProducerContext::new(tx))
                .map_err(|e| RouterError::Broker(format!("failed to create producer: {e}")))?;
        info!(brokers = %config.brokers, "kafka producer created");
        Ok((Self { producer }, rx))
    }
}

impl Publisher for KafkaPublisher {
    fn publish(&self, msg: &Message) -> Result<(), PublishError> {
        let mut record = BaseRecord::<[u8], [u8]>::to(&msg.topic)
            .key(&msg.key[..])
            .payload(&msg.value[..]);
        if let Some(partition) = msg.partition {
            record = record.partition(partition);
        }

        match self.producer.send(record) {
            Ok(()) => Ok(()),
            Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), _)) => {
                Err(PublishError::QueueFull)
            }
            Err((e, _)) => Err(PublishError::Fatal(e.to_string())),
        }
    }

    fn flush(&self, timeout: Duration) -> RouterResult<()> {
        self.producer.flush(timeout).map_err(|e| RouterError::Produce {
            topic: String::new(),
            error: format!("flush failed: {e}"),
        })
    }
}

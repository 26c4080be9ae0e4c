//! rdkafka client contexts.
//!
//! Both callbacks run on rdkafka's background threads and only hand data
//! over to the async side: rebalances go into a queue the message source
//! drains on its next poll, delivery reports go into an unbounded channel.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rdkafka::consumer::{ConsumerContext, Rebalance};
use rdkafka::producer::{DeliveryResult, ProducerContext};
use rdkafka::{ClientContext, Message as _, TopicPartitionList};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::consumer::SourceEvent;
use crate::message::DeliveryAck;

/// Consumer context that reports rebalances as [`SourceEvent`]s.
pub struct RouterConsumerContext {
    pending: Arc<Mutex<VecDeque<SourceEvent>>>,
}

impl RouterConsumerContext {
    /// Creates a context pushing into `pending`.
    #[must_use]
    pub fn new(pending: Arc<Mutex<VecDeque<SourceEvent>>>) -> Self {
        Self { pending }
    }
}

fn partitions(tpl: &TopicPartitionList) -> Vec<(String, i32)> {
    tpl.elements()
        .iter()
        .map(|e| (e.topic().to_string(), e.partition()))
        .collect()
}

impl ClientContext for RouterConsumerContext {}

impl ConsumerContext for RouterConsumerContext {
    fn post_rebalance(&self, rebalance: &Rebalance<'_>) {
        let event = match rebalance {
            Rebalance::Assign(tpl) => {
                info!(partitions_assigned = tpl.count(), "kafka rebalance: partitions assigned");
                SourceEvent::Assigned(partitions(tpl))
            }
            Rebalance::Revoke(tpl) => {
                info!(partitions_revoked = tpl.count(), "kafka rebalance: partitions revoked");
                SourceEvent::Revoked(partitions(tpl))
            }
            Rebalance::Error(msg) => {
                warn!(error = %msg, "kafka rebalance error");
                return;
            }
        };
        self.pending.lock().push_back(event);
    }
}

/// Producer context forwarding every delivery report as a [`DeliveryAck`].
pub struct RouterProducerContext {
    acks: mpsc::UnboundedSender<DeliveryAck>,
}

impl RouterProducerContext {
    /// Creates a context sending into `acks`.
    #[must_use]
    pub fn new(acks: mpsc::UnboundedSender<DeliveryAck>) -> Self {
        Self { acks }
    }
}

impl ClientContext for RouterProducerContext {}

impl ProducerContext for RouterProducerContext {
    type DeliveryOpaque = ();

    fn delivery(&self, result: &DeliveryResult<'_>, _opaque: Self::DeliveryOpaque) {
        let ack = match result {
            Ok(msg) => DeliveryAck::delivered(msg.topic(), msg.partition(), msg.offset()),
            Err((err, msg)) => DeliveryAck::failed(msg.topic(), msg.partition(), err.to_string()),
        };
        if self.acks.send(ack).is_err() {
            debug!("delivery report dropped, ack receiver closed");
        }
    }
}

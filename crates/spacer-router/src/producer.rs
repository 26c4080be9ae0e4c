//! Producer bridge.
//!
//! Decouples HTTP request handling from broker I/O. Writers hold a cloneable
//! [`ProducerHandle`] and push [`Message`]s onto a bounded channel; a
//! [`ProducerBridge`] task drains the channel into a [`Publisher`]. A full
//! channel makes [`ProducerHandle::submit`] wait, which is the only
//! backpressure the write path has.
//!
//! Delivery reports arrive separately on an unbounded channel fed by the
//! broker client and are consumed by [`drain_acknowledgments`].

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{RouterError, RouterResult};
use crate::message::{DeliveryAck, Message};
use crate::metrics::ProducerMetrics;

/// Default pause before retrying a queue-full send.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Timeout for the final flush when the bridge stops.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a publisher refused a message.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The client's local queue is full; retry later.
    #[error("producer queue full")]
    QueueFull,

    /// Any other enqueue failure.
    #[error("{0}")]
    Fatal(String),
}

/// Broker producer seam.
///
/// `publish` only enqueues; the outcome arrives later as a [`DeliveryAck`].
pub trait Publisher: Send + Sync + 'static {
    /// Enqueues one message.
    ///
    /// # Errors
    ///
    /// [`PublishError::QueueFull`] when the local queue has no room,
    /// [`PublishError::Fatal`] otherwise.
    fn publish(&self, msg: &Message) -> Result<(), PublishError>;

    /// Waits for outstanding messages to be delivered.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Produce`] if the flush does not complete.
    fn flush(&self, _timeout: Duration) -> RouterResult<()> {
        Ok(())
    }
}

/// Cloneable sending side of the bridge.
#[derive(Debug, Clone)]
pub struct ProducerHandle {
    tx: mpsc::Sender<Message>,
    metrics: Arc<ProducerMetrics>,
}

impl ProducerHandle {
    /// Queues a message, waiting while the channel is full.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::ChannelClosed`] once the bridge has stopped.
    pub async fn submit(&self, msg: Message) -> RouterResult<()> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| RouterError::ChannelClosed("producer"))?;
        self.metrics.record_submitted();
        Ok(())
    }

    /// Counters shared with the bridge.
    #[must_use]
    pub fn metrics(&self) -> &Arc<ProducerMetrics> {
        &self.metrics
    }
}

/// Receiving side of the bridge; owns the publisher.
pub struct ProducerBridge<P> {
    publisher: P,
    rx: mpsc::Receiver<Message>,
    metrics: Arc<ProducerMetrics>,
    retry_backoff: Duration,
}

impl<P: Publisher> ProducerBridge<P> {
    /// Creates a bridge with a channel of `capacity` messages.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; configuration validation rejects that.
    pub fn new(publisher: P, capacity: usize) -> (Self, ProducerHandle) {
        let (tx, rx) = mpsc::channel(capacity);
        let metrics = Arc::new(ProducerMetrics::new());
        let handle = ProducerHandle {
            tx,
            metrics: Arc::clone(&metrics),
        };
        let bridge = Self {
            publisher,
            rx,
            metrics,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        };
        (bridge, handle)
    }

    /// Sets the pause between queue-full retries.
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Counters shared with every handle.
    #[must_use]
    pub fn metrics(&self) -> &Arc<ProducerMetrics> {
        &self.metrics
    }

    /// Forwards messages until every handle is dropped or `cancel` fires.
    ///
    /// On cancellation the channel is closed, already queued messages are
    /// still published, and the publisher is flushed.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Produce`] on a non-retryable enqueue failure.
    pub async fn run(mut self, cancel: CancellationToken) -> RouterResult<()> {
        info!("producer bridge started");
        let mut closing = false;
        loop {
            let msg = tokio::select! {
                biased;
                msg = self.rx.recv() => msg,
                () = cancel.cancelled(), if !closing => {
                    debug!("producer bridge closing channel");
                    self.rx.close();
                    closing = true;
                    continue;
                }
            };
            let Some(msg) = msg else { break };
            self.publish(&msg).await?;
        }

        if let Err(e) = self.publisher.flush(FLUSH_TIMEOUT) {
            warn!(error = %e, "producer flush failed");
        }
        let snap = self.metrics.snapshot();
        info!(
            submitted = snap.submitted,
            published = snap.published,
            "producer bridge stopped"
        );
        Ok(())
    }

    async fn publish(&self, msg: &Message) -> RouterResult<()> {
        loop {
            match self.publisher.publish(msg) {
                Ok(()) => {
                    self.metrics.record_published();
                    return Ok(());
                }
                Err(PublishError::QueueFull) => {
                    self.metrics.record_queue_full();
                    debug!(topic = %msg.topic, "producer queue full, retrying");
                    tokio::time::sleep(self.retry_backoff).await;
                }
                Err(PublishError::Fatal(error)) => {
                    error!(topic = %msg.topic, error = %error, "failed to enqueue message");
                    return Err(RouterError::Produce {
                        topic: msg.topic.clone(),
                        error,
                    });
                }
            }
        }
    }
}

/// Consumes delivery reports until the producer closes its side.
///
/// # Errors
///
/// Returns [`RouterError::Delivery`] on the first failed delivery.
pub async fn drain_acknowledgments(
    mut acks: mpsc::UnboundedReceiver<DeliveryAck>,
    metrics: Arc<ProducerMetrics>,
) -> RouterResult<()> {
    while let Some(ack) = acks.recv().await {
        if let Some(error) = ack.error {
            metrics.record_delivery_failure();
            error!(
                topic = %ack.topic,
                partition = ack.partition,
                error = %error,
                "delivery failed"
            );
            return Err(RouterError::Delivery {
                topic: ack.topic,
                partition: ack.partition,
                error,
            });
        }
        metrics.record_delivered();
        info!(
            topic = %ack.topic,
            partition = ack.partition,
            offset = ack.offset,
            "delivered message"
        );
    }
    debug!("delivery report channel closed");
    Ok(())
}

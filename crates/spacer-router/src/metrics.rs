//! Router counters.
//!
//! Lock-free atomic counters for the consumer and producer paths. All
//! counters use `Relaxed` ordering; snapshots are for logging and tests.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the consumer dispatch loop.
#[derive(Debug, Default)]
pub struct ConsumerMetrics {
    received: AtomicU64,
    invoked: AtomicU64,
    committed: AtomicU64,
    invoke_failures: AtomicU64,
    commit_failures: AtomicU64,
    unrouted: AtomicU64,
}

/// Point-in-time copy of [`ConsumerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerMetricsSnapshot {
    /// Messages received from the broker.
    pub received: u64,
    /// Handler invocations attempted.
    pub invoked: u64,
    /// Offsets committed.
    pub committed: u64,
    /// Handler invocations that failed.
    pub invoke_failures: u64,
    /// Commits the broker rejected.
    pub commit_failures: u64,
    /// Messages with no configured route.
    pub unrouted: u64,
}

impl ConsumerMetrics {
    /// Creates a zeroed counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a received message.
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a handler invocation.
    pub fn record_invoked(&self) {
        self.invoked.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a committed offset.
    pub fn record_committed(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed invocation.
    pub fn record_invoke_failure(&self) {
        self.invoke_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed commit.
    pub fn record_commit_failure(&self) {
        self.commit_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a message without a route.
    pub fn record_unrouted(&self) {
        self.unrouted.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> ConsumerMetricsSnapshot {
        ConsumerMetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            invoked: self.invoked.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            invoke_failures: self.invoke_failures.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
            unrouted: self.unrouted.load(Ordering::Relaxed),
        }
    }
}

/// Counters for the producer bridge.
#[derive(Debug, Default)]
pub struct ProducerMetrics {
    submitted: AtomicU64,
    published: AtomicU64,
    queue_full_retries: AtomicU64,
    delivered: AtomicU64,
    delivery_failures: AtomicU64,
}

/// Point-in-time copy of [`ProducerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerMetricsSnapshot {
    /// Messages accepted onto the bridge channel.
    pub submitted: u64,
    /// Messages handed to the broker producer.
    pub published: u64,
    /// Times the producer queue was full and a send was retried.
    pub queue_full_retries: u64,
    /// Delivery acknowledgments without error.
    pub delivered: u64,
    /// Delivery acknowledgments carrying an error.
    pub delivery_failures: u64,
}

impl ProducerMetrics {
    /// Creates a zeroed counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message accepted onto the channel.
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a message handed to the producer.
    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a queue-full retry.
    pub fn record_queue_full(&self) {
        self.queue_full_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful delivery.
    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed delivery.
    pub fn record_delivery_failure(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> ProducerMetricsSnapshot {
        ProducerMetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            queue_full_retries: self.queue_full_retries.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
        }
    }
}

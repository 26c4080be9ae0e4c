//! Consumer dispatch loop.
//!
//! [`ConsumerLoop`] polls a [`MessageSource`], resolves the route for every
//! message, calls the handler through an [`Invoker`] and commits the offset
//! only after the handler answered success. A failed call rewinds the
//! partition so the same message is redelivered on the next poll. If the
//! rewind itself fails on a partition this consumer still owns, the loop
//! stops with a broker error rather than commit a later offset past it.
//!
//! One message is in flight at a time. Cancellation is observed only while
//! polling, never during an invocation.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::UnroutedPolicy;
use crate::error::{RouterError, RouterResult};
use crate::invoke::Invoker;
use crate::message::InboundMessage;
use crate::metrics::ConsumerMetrics;
use crate::rebalance::RebalanceState;
use crate::route::{RouteTable, UPDATE_EVENT};

/// One event surfaced by a [`MessageSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A consumed record.
    Message(InboundMessage),
    /// The consumer reached the end of a partition.
    PartitionEof {
        /// Topic, when the client reports it.
        topic: Option<String>,
        /// Partition.
        partition: i32,
    },
    /// Partitions were assigned to this consumer.
    Assigned(Vec<(String, i32)>),
    /// Partitions were revoked from this consumer.
    Revoked(Vec<(String, i32)>),
    /// The poll timed out without an event.
    Idle,
}

/// Broker consumer seam.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Waits for the next event, at most one poll timeout.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RouterError::Broker`] on a consumer-level failure.
    async fn poll(&mut self) -> RouterResult<SourceEvent>;

    /// Synchronously commits the offset following `msg`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RouterError::Broker`] if the broker rejects the commit.
    fn commit(&self, msg: &InboundMessage) -> RouterResult<()>;

    /// Repositions the partition of `msg` back to its offset so it is
    /// delivered again.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RouterError::Broker`] if the seek fails.
    fn rewind(&self, msg: &InboundMessage) -> RouterResult<()>;
}

/// What happened to one dispatched message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handler succeeded and the offset was committed.
    Committed,
    /// Handler succeeded but the commit failed.
    CommitFailed,
    /// Handler failed; the message stays uncommitted.
    InvokeFailed,
    /// No route matched.
    Unrouted,
}

/// Poll → route → invoke → commit loop.
pub struct ConsumerLoop<S> {
    source: S,
    invoker: Arc<dyn Invoker>,
    routes: Arc<RouteTable>,
    unrouted: UnroutedPolicy,
    metrics: Arc<ConsumerMetrics>,
    rebalance: RebalanceState,
}

impl<S: MessageSource> ConsumerLoop<S> {
    /// Creates a loop over `source` with the given routes.
    pub fn new(source: S, invoker: Arc<dyn Invoker>, routes: Arc<RouteTable>) -> Self {
        Self {
            source,
            invoker,
            routes,
            unrouted: UnroutedPolicy::default(),
            metrics: Arc::new(ConsumerMetrics::new()),
            rebalance: RebalanceState::new(),
        }
    }

    /// Sets the unrouted-message policy.
    #[must_use]
    pub fn with_unrouted_policy(mut self, policy: UnroutedPolicy) -> Self {
        self.unrouted = policy;
        self
    }

    /// Shares an existing counter set.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<ConsumerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Counters for this loop.
    #[must_use]
    pub fn metrics(&self) -> &Arc<ConsumerMetrics> {
        &self.metrics
    }

    /// Partitions currently owned.
    #[must_use]
    pub fn rebalance_state(&self) -> &RebalanceState {
        &self.rebalance
    }

    /// Runs until `cancel` fires or the source fails.
    ///
    /// # Errors
    ///
    /// Returns the source's error on a broker-level failure. The caller is
    /// expected to shut the process down.
    pub async fn run(mut self, cancel: CancellationToken) -> RouterResult<()> {
        info!(
            routes = self.routes.len(),
            applications = ?self.routes.applications(),
            "consumer loop started"
        );

        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = self.source.poll() => event,
            };
            let handled = match event {
                Ok(event) => self.handle_event(event).await,
                Err(e) => Err(e),
            };
            if let Err(e) = handled {
                error!(error = %e, "consumer error");
                return Err(e);
            }
        }

        let snap = self.metrics.snapshot();
        info!(
            received = snap.received,
            committed = snap.committed,
            invoke_failures = snap.invoke_failures,
            assigned = self.rebalance.assigned_count(),
            rebalances = self.rebalance.rebalance_count(),
            "consumer loop stopped"
        );
        Ok(())
    }

    async fn handle_event(&mut self, event: SourceEvent) -> RouterResult<()> {
        match event {
            SourceEvent::Message(msg) => {
                self.dispatch(&msg).await?;
            }
            SourceEvent::PartitionEof { topic, partition } => {
                debug!(topic = ?topic, partition, "reached end of partition");
            }
            SourceEvent::Assigned(partitions) => {
                info!(partitions = ?partitions, "partitions assigned");
                self.rebalance.on_assign(&partitions);
            }
            SourceEvent::Revoked(partitions) => {
                info!(partitions = ?partitions, "partitions revoked");
                self.rebalance.on_revoke(&partitions);
            }
            SourceEvent::Idle => {}
        }
        Ok(())
    }

    /// Handles one message end to end.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Broker`] if a failed message cannot be rewound
    /// on a partition this consumer still owns.
    pub async fn dispatch(&self, msg: &InboundMessage) -> RouterResult<DispatchOutcome> {
        self.metrics.record_received();
        let route = RouteTable::route_key(&msg.topic, UPDATE_EVENT);

        let Some(handler) = self.routes.lookup(&route) else {
            self.metrics.record_unrouted();
            warn!(
                topic = %msg.topic,
                partition = msg.partition,
                offset = msg.offset,
                route = %route,
                "no route for message"
            );
            if self.unrouted == UnroutedPolicy::Commit {
                self.commit(msg);
            }
            return Ok(DispatchOutcome::Unrouted);
        };

        self.metrics.record_invoked();
        if let Err(e) = self.invoker.invoke(handler, msg.payload()).await {
            self.metrics.record_invoke_failure();
            warn!(
                topic = %msg.topic,
                partition = msg.partition,
                offset = msg.offset,
                handler = %handler,
                error = %e,
                "handler invocation failed, message left uncommitted"
            );
            self.rewind(msg)?;
            return Ok(DispatchOutcome::InvokeFailed);
        }

        if self.commit(msg) {
            Ok(DispatchOutcome::Committed)
        } else {
            Ok(DispatchOutcome::CommitFailed)
        }
    }

    fn rewind(&self, msg: &InboundMessage) -> RouterResult<()> {
        let Err(e) = self.source.rewind(msg) else {
            return Ok(());
        };
        if self.rebalance.is_revoked(&msg.topic, msg.partition) {
            warn!(
                topic = %msg.topic,
                partition = msg.partition,
                offset = msg.offset,
                error = %e,
                "rewind failed on revoked partition, message left to the new owner"
            );
            return Ok(());
        }
        Err(RouterError::Broker(format!(
            "failed to rewind {}[{}] to offset {}: {e}",
            msg.topic, msg.partition, msg.offset
        )))
    }

    fn commit(&self, msg: &InboundMessage) -> bool {
        match self.source.commit(msg) {
            Ok(()) => {
                self.metrics.record_committed();
                debug!(
                    topic = %msg.topic,
                    partition = msg.partition,
                    offset = msg.offset,
                    "offset committed"
                );
                true
            }
            Err(e) => {
                self.metrics.record_commit_failure();
                warn!(
                    topic = %msg.topic,
                    partition = msg.partition,
                    offset = msg.offset,
                    error = %e,
                    "commit failed"
                );
                false
            }
        }
    }
}

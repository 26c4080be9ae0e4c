//! Periodic broker metadata refresh.
//!
//! Purely informational: the latest topic list is kept for inspection and
//! logged, but subscriptions are pattern based and never depend on it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{RouterError, RouterResult};

/// Source of broker topic metadata. Implementations may block.
pub trait MetadataSource: Send + Sync + 'static {
    /// Fetches the names of all topics known to the cluster.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Broker`] if the request fails or times out.
    fn topic_names(&self, timeout: Duration) -> RouterResult<Vec<String>>;
}

/// Polls a [`MetadataSource`] on a fixed interval.
pub struct MetadataRefresher<M> {
    source: Arc<M>,
    interval: Duration,
    timeout: Duration,
    known_topics: Arc<RwLock<Vec<String>>>,
}

impl<M: MetadataSource> MetadataRefresher<M> {
    /// Creates a refresher; nothing is fetched until [`run`](Self::run).
    pub fn new(source: M, interval: Duration, timeout: Duration) -> Self {
        Self {
            source: Arc::new(source),
            interval,
            timeout,
            known_topics: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Shared view of the last successful refresh.
    #[must_use]
    pub fn known_topics(&self) -> Arc<RwLock<Vec<String>>> {
        Arc::clone(&self.known_topics)
    }

    /// Fetches metadata once. Failures are logged and leave the previous
    /// snapshot in place.
    pub async fn refresh_once(&self) -> bool {
        let source = Arc::clone(&self.source);
        let timeout = self.timeout;
        let result = tokio::task::spawn_blocking(move || source.topic_names(timeout))
            .await
            .unwrap_or_else(|e| Err(RouterError::Broker(format!("metadata task failed: {e}"))));

        match result {
            Ok(mut topics) => {
                topics.sort();
                debug!(count = topics.len(), topics = ?topics, "refreshed broker metadata");
                *self.known_topics.write() = topics;
                true
            }
            Err(e) => {
                warn!(error = %e, "metadata refresh failed");
                false
            }
        }
    }

    /// Refreshes every interval until cancelled.
    ///
    /// # Errors
    ///
    /// Never; the result type matches the other supervised tasks.
    pub async fn run(self, cancel: CancellationToken) -> RouterResult<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.refresh_once().await;
                }
            }
        }
        debug!("metadata refresher stopped");
        Ok(())
    }
}

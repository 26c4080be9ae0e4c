//! Task supervision and shutdown.
//!
//! Every long-running component is one task in a [`JoinSet`]. The first of
//! ctrl-c or any task finishing cancels the shared token; the remaining
//! tasks get a grace period to stop before they are aborted.

use std::future::Future;
use std::time::Duration;

use spacer_router::{RouterError, RouterResult};
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Name and result of a finished task.
pub type TaskOutcome = (&'static str, RouterResult<()>);

/// Why the process is exiting with a failure.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// A component returned a fatal error.
    #[error("{task} failed: {source}")]
    Failed {
        /// Task name.
        task: &'static str,
        /// The error it returned.
        #[source]
        source: RouterError,
    },

    /// A component panicked.
    #[error("task panicked: {0}")]
    Panicked(#[from] JoinError),
}

/// Spawns `fut` under `name`.
pub fn spawn_named<F>(tasks: &mut JoinSet<TaskOutcome>, name: &'static str, fut: F)
where
    F: Future<Output = RouterResult<()>> + Send + 'static,
{
    tasks.spawn(async move { (name, fut.await) });
}

fn classify(joined: Result<TaskOutcome, JoinError>) -> Option<ShutdownError> {
    match joined {
        Ok((task, Ok(()))) => {
            info!(task, "task finished");
            None
        }
        Ok((task, Err(e))) if e.is_fatal() => {
            error!(task, error = %e, "fatal error");
            Some(ShutdownError::Failed { task, source: e })
        }
        Ok((task, Err(e))) => {
            warn!(task, error = %e, "task stopped");
            None
        }
        Err(e) if e.is_cancelled() => None,
        Err(e) => {
            error!(error = %e, "task panicked");
            Some(ShutdownError::Panicked(e))
        }
    }
}

/// Waits for ctrl-c or the first task to finish, then shuts everything down.
///
/// # Errors
///
/// Returns the first fatal task error or panic.
pub async fn supervise(
    mut tasks: JoinSet<TaskOutcome>,
    cancel: CancellationToken,
    grace: Duration,
) -> Result<(), ShutdownError> {
    let mut failure = None;

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for ctrl-c");
            }
            info!("received ctrl-c, shutting down");
        }
        Some(joined) = tasks.join_next() => {
            failure = classify(joined);
        }
    }

    cancel.cancel();

    let drain = async {
        while let Some(joined) = tasks.join_next().await {
            if let Some(e) = classify(joined) {
                failure.get_or_insert(e);
            }
        }
    };
    if tokio::time::timeout(grace, drain).await.is_err() {
        warn!(remaining = tasks.len(), "tasks did not stop in time, aborting");
        tasks.abort_all();
    }

    failure.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fatal_error_cancels_others() {
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();

        let token = cancel.clone();
        spawn_named(&mut tasks, "consumer", async move {
            token.cancelled().await;
            Ok(())
        });
        spawn_named(&mut tasks, "acks", async {
            Err(RouterError::Delivery {
                topic: "PoESocial_stat".into(),
                partition: 0,
                error: "broker down".into(),
            })
        });

        let err = supervise(tasks, cancel.clone(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ShutdownError::Failed { task: "acks", .. }));
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_clean_finish_is_ok() {
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        spawn_named(&mut tasks, "metadata", async { Ok(()) });

        assert!(supervise(tasks, cancel, Duration::from_secs(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_stuck_task_is_aborted() {
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        spawn_named(&mut tasks, "stuck", std::future::pending());
        spawn_named(&mut tasks, "bridge", async {
            Err(RouterError::Produce {
                topic: "PoESocial_stat".into(),
                error: "unknown topic".into(),
            })
        });

        let err = supervise(tasks, cancel, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, ShutdownError::Failed { task: "bridge", .. }));
    }
}

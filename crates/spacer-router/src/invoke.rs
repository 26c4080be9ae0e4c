//! Handler invocation.
//!
//! [`Invoker`] is the seam between the consumer loop and the delegate
//! services. [`HttpInvoker`] posts the raw message value as a JSON body and
//! treats exactly `200 OK` as success. It never retries: a failed call
//! leaves the message uncommitted and redelivery is the retry.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;

use crate::error::{RouterError, RouterResult};

/// Why a handler call did not succeed.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The handler answered with a status other than 200.
    #[error("function not ok: {0}")]
    Status(u16),

    /// The request never produced a response.
    #[error("post event handler failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Calls a handler with a message payload.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Invokes the handler at `url` with `payload` as the body.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError`] when the handler does not acknowledge success.
    async fn invoke(&self, url: &str, payload: Bytes) -> Result<(), InvokeError>;
}

/// `reqwest`-backed invoker.
#[derive(Debug, Clone, Default)]
pub struct HttpInvoker {
    client: reqwest::Client,
}

impl HttpInvoker {
    /// Creates an invoker with an optional per-request timeout.
    ///
    /// `None` leaves requests unbounded.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Config`] if the HTTP client cannot be built.
    pub fn new(request_timeout: Option<Duration>) -> RouterResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| RouterError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Invoker for HttpInvoker {
    async fn invoke(&self, url: &str, payload: Bytes) -> Result<(), InvokeError> {
        debug!(handler = %url, bytes = payload.len(), "invoking handler");
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(InvokeError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::post;
    use axum::Router;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Clone, Default)]
    struct Recorded {
        bodies: Arc<Mutex<Vec<(Option<String>, Bytes)>>>,
    }

    async fn record(
        State(rec): State<Recorded>,
        headers: HeaderMap,
        body: Bytes,
    ) -> AxumStatus {
        let content_type = headers
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        rec.bodies.lock().push((content_type, body));
        AxumStatus::OK
    }

    async fn spawn_handler_server(rec: Recorded) -> String {
        let app = Router::new()
            .route("/ok", post(record))
            .route("/created", post(|| async { AxumStatus::CREATED }))
            .route("/broken", post(|| async { AxumStatus::INTERNAL_SERVER_ERROR }))
            .with_state(rec);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_invoke_posts_raw_json_body() {
        let rec = Recorded::default();
        let base = spawn_handler_server(rec.clone()).await;
        let invoker = HttpInvoker::new(None).unwrap();

        let payload = Bytes::from_static(br#"{"stash":"abc","items":[1,2]}"#);
        invoker
            .invoke(&format!("{base}/ok"), payload.clone())
            .await
            .unwrap();

        let bodies = rec.bodies.lock();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].0.as_deref(), Some("application/json"));
        assert_eq!(bodies[0].1, payload);
    }

    #[tokio::test]
    async fn test_non_200_success_status_is_failure() {
        let base = spawn_handler_server(Recorded::default()).await;
        let invoker = HttpInvoker::new(None).unwrap();

        let err = invoker
            .invoke(&format!("{base}/created"), Bytes::from_static(b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::Status(201)));
    }

    #[tokio::test]
    async fn test_server_error_is_failure() {
        let base = spawn_handler_server(Recorded::default()).await;
        let invoker = HttpInvoker::new(Some(Duration::from_secs(5))).unwrap();

        let err = invoker
            .invoke(&format!("{base}/broken"), Bytes::from_static(b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::Status(500)));
        assert_eq!(err.to_string(), "function not ok: 500");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let invoker = HttpInvoker::new(None).unwrap();
        let err = invoker
            .invoke(&format!("http://{addr}/ok"), Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::Transport(_)));
    }
}

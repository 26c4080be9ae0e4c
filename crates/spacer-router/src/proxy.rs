//! HTTP write proxy.
//!
//! `POST /` accepts a batch of key/value entries for one topic and queues
//! each entry as a separate message on the producer bridge:
//!
//! ```json
//! { "topic": "stat", "entries": { "a": 1, "b": {"x": true} } }
//! ```
//!
//! Entries are published to `<app_name>_<topic>` with the entry key as the
//! message key and the raw JSON text of the value as the message value.
//! A `200 ok` response means the entries were queued, not produced.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::value::RawValue;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::RouterResult;
use crate::message::Message;
use crate::producer::ProducerHandle;
use crate::route::app_topic;

/// Write request schema version understood by the proxy.
pub const WRITE_SCHEMA_VERSION: u32 = 1;

/// Why a write request body was rejected.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not well-formed JSON, or missing `topic`.
    #[error("invalid write request: {0}")]
    Json(#[from] serde_json::Error),

    /// The request named a schema version other than 1.
    #[error("unsupported write request version {0}")]
    UnsupportedVersion(u32),
}

/// Decoded body of `POST /`.
#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    /// Topic without the application prefix.
    pub topic: String,
    /// Entry key to raw JSON value.
    #[serde(default)]
    pub entries: BTreeMap<String, Box<RawValue>>,
    /// Optional schema version.
    #[serde(default)]
    pub version: Option<u32>,
}

impl WriteRequest {
    /// Parses a request body.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] on malformed JSON, a missing topic or an
    /// unsupported version.
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let request: Self = serde_json::from_slice(body)?;
        match request.version {
            Some(v) if v != WRITE_SCHEMA_VERSION => Err(DecodeError::UnsupportedVersion(v)),
            _ => Ok(request),
        }
    }

    /// One message per entry, addressed to `<app_name>_<topic>`.
    #[must_use]
    pub fn into_messages(self, app_name: &str) -> Vec<Message> {
        let topic = app_topic(app_name, &self.topic);
        self.entries
            .into_iter()
            .map(|(key, value)| {
                Message::new(
                    topic.clone(),
                    key,
                    Bytes::copy_from_slice(value.get().as_bytes()),
                )
            })
            .collect()
    }
}

/// Shared state of the proxy routes.
#[derive(Debug, Clone)]
pub struct WriteProxyState {
    app_name: Arc<str>,
    producer: ProducerHandle,
    max_body_bytes: usize,
}

impl WriteProxyState {
    /// Creates the state for `app_name`, writing through `producer`.
    pub fn new(app_name: &str, producer: ProducerHandle, max_body_bytes: usize) -> Self {
        Self {
            app_name: Arc::from(app_name),
            producer,
            max_body_bytes,
        }
    }
}

/// Builds the proxy router.
pub fn write_proxy_router(state: WriteProxyState) -> Router {
    Router::new().route("/", post(write)).with_state(state)
}

/// Serves the proxy on `listener` until `cancel` fires.
///
/// # Errors
///
/// Returns [`crate::RouterError::Io`] if the server fails.
pub async fn serve(
    listener: TcpListener,
    state: WriteProxyState,
    cancel: CancellationToken,
) -> RouterResult<()> {
    info!(
        addr = ?listener.local_addr().ok(),
        app_name = %state.app_name,
        "write proxy listening"
    );
    axum::serve(listener, write_proxy_router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    debug!("write proxy stopped");
    Ok(())
}

async fn write(State(state): State<WriteProxyState>, body: Body) -> Response {
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "failed to read write request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let request = match WriteRequest::decode(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, bytes = body.len(), "rejected write request");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let messages = request.into_messages(&state.app_name);
    let total = messages.len();
    for (queued, msg) in messages.into_iter().enumerate() {
        let topic = msg.topic.clone();
        if let Err(e) = state.producer.submit(msg).await {
            warn!(topic = %topic, queued, total, error = %e, "write abandoned");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    }

    debug!(app_name = %state.app_name, entries = total, "queued write request");
    (StatusCode::OK, "ok").into_response()
}

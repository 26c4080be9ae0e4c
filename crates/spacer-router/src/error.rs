//! Error types for the router.
//!
//! [`RouterError`] covers every failure that can leave a component. Errors
//! that stay local to one message (a failed handler call, a rejected write
//! body) have their own types in [`crate::invoke`] and [`crate::proxy`] and
//! never reach the shutdown routine.

use thiserror::Error;

/// Result alias for router operations.
pub type RouterResult<T> = Result<T, RouterError>;

/// Errors raised by router components.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The static route table could not be built.
    #[error("route table error: {0}")]
    Route(String),

    /// Broker-level failure on the consumer side. Fatal.
    #[error("broker error: {0}")]
    Broker(String),

    /// The broker reported a failed delivery. Fatal.
    #[error("delivery failed for {topic} [{partition}]: {error}")]
    Delivery {
        /// Topic the message was produced to.
        topic: String,
        /// Partition reported by the broker (`-1` if unassigned).
        partition: i32,
        /// Broker error description.
        error: String,
    },

    /// The producer refused a message for a reason other than a full queue. Fatal.
    #[error("produce failed for {topic}: {error}")]
    Produce {
        /// Topic the message was addressed to.
        topic: String,
        /// Producer error description.
        error: String,
    },

    /// An internal channel was closed by its receiving side.
    #[error("{0} channel closed")]
    ChannelClosed(&'static str),

    /// I/O failure (listener bind, config file read, server accept loop).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RouterError {
    /// Returns `true` if this error must terminate the process.
    ///
    /// Configuration and route errors only happen at startup and abort it
    /// as well, so every variant except a closed channel counts.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ChannelClosed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_display() {
        let err = RouterError::Delivery {
            topic: "PoESocial_stat".into(),
            partition: 2,
            error: "Message timed out".into(),
        };
        assert_eq!(
            err.to_string(),
            "delivery failed for PoESocial_stat [2]: Message timed out"
        );
    }

    #[test]
    fn test_io_from() {
        let err: RouterError = std::io::Error::other("bind").into();
        assert!(matches!(err, RouterError::Io(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_channel_closed_not_fatal() {
        let err = RouterError::ChannelClosed("producer");
        assert_eq!(err.to_string(), "producer channel closed");
        assert!(!err.is_fatal());
    }
}

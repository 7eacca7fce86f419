//! Error types for the dispatch core

use thiserror::Error;

/// Boxed error type accepted from handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result returned by a single handler invocation.
pub type HandlerResult = Result<(), HandlerError>;

/// Error raised by a handler while processing an event.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Handler failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Source(#[from] BoxError),
}

impl HandlerError {
    /// Create a failure from a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Error surfaced to the caller of `post`.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Handler `{label}` for {event} (priority {priority}) failed: {source}")]
    HandlerFailed {
        event: &'static str,
        label: &'static str,
        priority: i32,
        #[source]
        source: HandlerError,
    },

    #[error("{} handler(s) failed", .0.len())]
    HandlersFailed(Vec<DispatchError>),
}

impl DispatchError {
    /// Number of individual handler failures carried by this error.
    pub fn failure_count(&self) -> usize {
        match self {
            DispatchError::HandlerFailed { .. } => 1,
            DispatchError::HandlersFailed(errors) => errors.len(),
        }
    }
}

/// Error raised while binding a subscriber's handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error(
        "Handler `{label}` for {event} expects {found} extra argument(s) but the wrapper provides {expected}"
    )]
    WrapperArityMismatch {
        event: &'static str,
        label: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Handler `{label}` was built for {found} but bound to {expected}")]
    EventTypeMismatch {
        expected: &'static str,
        label: &'static str,
        found: &'static str,
    },

    #[error("Handler `{label}` for {event} decomposes with a wrapper the bus did not register")]
    ForeignWrapper {
        event: &'static str,
        label: &'static str,
    },

    /// Raised by subscribers refusing to bind.
    #[error("Binding rejected: {0}")]
    Rejected(String),
}

/// Error raised while finalizing a bus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Event type {0} is not part of the catalog")]
    UnknownEventType(&'static str),

    #[error("Wrapper for {event} has arity {arity}, maximum is {max}")]
    ArityTooLarge {
        event: &'static str,
        arity: usize,
        max: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_from_boxed() {
        let io = std::io::Error::other("disk gone");
        let err: HandlerError = BoxError::from(io).into();
        assert_eq!(err.to_string(), "disk gone");
    }

    #[test]
    fn test_failure_count() {
        let single = DispatchError::HandlerFailed {
            event: "Ping",
            label: "on_ping",
            priority: 0,
            source: HandlerError::failed("boom"),
        };
        assert_eq!(single.failure_count(), 1);
        assert!(single.to_string().contains("on_ping"));

        let many = DispatchError::HandlersFailed(vec![single]);
        assert_eq!(many.failure_count(), 1);
        assert_eq!(many.to_string(), "1 handler(s) failed");
    }

    #[test]
    fn test_bind_error_messages() {
        let rejected = BindError::Rejected("maintenance mode".to_string());
        assert_eq!(rejected.to_string(), "Binding rejected: maintenance mode");

        let mismatch = BindError::EventTypeMismatch {
            expected: "Ping",
            label: "on_pong",
            found: "Pong",
        };
        assert_eq!(
            mismatch.to_string(),
            "Handler `on_pong` was built for Pong but bound to Ping"
        );
    }
}

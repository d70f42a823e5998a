//! Error types for the mock handler and its transports.
//!
//! Two channels exist. [`ConfigError`] is returned synchronously, before any
//! asynchronous work starts, when the caller hands over options that can never
//! work. Everything else is a [`TransferError`] and travels through the
//! returned future.

use bytes::Bytes;
use hyper::{HeaderMap, Method, Request, Response, StatusCode, Uri};
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Boxed error produced by user callbacks (factories, header hooks).
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Caller configuration errors. Never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be callable")]
    NotCallable(&'static str),
}

/// Request line and headers of a request, kept for error reports and stats.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RequestHead {
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
        }
    }
}

/// Failure of a single request, mocked or real.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The `on_headers` hook failed. `response` is what the hook was shown;
    /// factories and registered errors have no concrete response yet.
    #[error("{message}")]
    HeaderHook {
        message: String,
        request: Box<RequestHead>,
        response: Option<Box<Response<Bytes>>>,
        #[source]
        source: BoxError,
    },

    /// A response factory returned an error.
    #[error("response factory failed: {0}")]
    Factory(#[source] BoxError),

    /// An error registered as the response for a rule.
    #[error("{0}")]
    Mocked(Arc<dyn StdError + Send + Sync>),

    #[error("failed to write response body to sink: {0}")]
    Sink(#[source] std::io::Error),

    #[error("invalid request for {url}: {source}")]
    InvalidRequest {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to create transport: {0}")]
    Transport(#[source] std::io::Error),

    #[error("request to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// Raised by the client when `http_errors` is enabled and the response is 4xx/5xx.
    #[error("{method} {url} resulted in a {status} response")]
    Status {
        method: Method,
        url: String,
        status: StatusCode,
        response: Box<Response<Bytes>>,
    },
}

impl TransferError {
    /// Response attached to the failure, if any.
    pub fn response(&self) -> Option<&Response<Bytes>> {
        match self {
            TransferError::HeaderHook { response, .. } => response.as_deref(),
            TransferError::Status { response, .. } => Some(response),
            _ => None,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TransferError::HeaderHook { .. } => "on_headers",
            TransferError::Factory(_) => "factory",
            TransferError::Mocked(_) => "mocked",
            TransferError::Sink(_) => "sink",
            TransferError::InvalidRequest { .. } => "invalid_request",
            TransferError::Transport(_) => "transport",
            TransferError::Connect { .. } => "connect",
            TransferError::Timeout { .. } => "timeout",
            TransferError::Status { .. } => "status",
        }
    }
}

/// Error returned by the [`Client`](crate::client::Client) convenience methods.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl ClientError {
    pub fn as_transfer(&self) -> Option<&TransferError> {
        match self {
            ClientError::Transfer(err) => Some(err),
            ClientError::Config(_) => None,
        }
    }
}

/// Plain error value for responses registered as failures, e.g. from a definitions file.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct MockedError(pub String);

impl MockedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_message() {
        let err = ConfigError::NotCallable("on_headers");
        assert_eq!(err.to_string(), "on_headers must be callable");
    }

    #[test]
    fn test_header_hook_error_keeps_cause() {
        let request = Request::get("https://example.com/a").body(()).unwrap();
        let err = TransferError::HeaderHook {
            message: "An error was encountered during the on_headers event".to_string(),
            request: Box::new(RequestHead::from_request(&request)),
            response: Some(Box::new(Response::new(Bytes::from_static(b"x")))),
            source: Box::new(MockedError::new("boom")),
        };

        assert_eq!(
            err.to_string(),
            "An error was encountered during the on_headers event"
        );
        assert_eq!(err.source().unwrap().to_string(), "boom");
        assert_eq!(err.response().unwrap().body(), &Bytes::from_static(b"x"));
        assert_eq!(err.kind(), "on_headers");
    }

    #[test]
    fn test_mocked_error_is_transparent() {
        let err = TransferError::Mocked(Arc::new(MockedError::new("connection reset")));
        assert_eq!(err.to_string(), "connection reset");
        assert!(err.response().is_none());
    }
}

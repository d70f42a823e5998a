//! Request transports.
//!
//! A transport takes a request plus its options and yields a future of the
//! response. The mock handler and the real HTTP transport both implement
//! [`Transport`], so a client can be pointed at either.

mod http;

pub use http::HttpTransport;

use crate::delivery::RequestOptions;
use crate::error::{ConfigError, TransferError};
use bytes::Bytes;
use futures::future::BoxFuture;
use hyper::{Request, Response};
use std::sync::Arc;

/// Pending result of one request.
pub type ResponseFuture = BoxFuture<'static, Result<Response<Bytes>, TransferError>>;

/// Builds the transport used for unmatched requests.
pub type TransportFactory =
    dyn Fn() -> Result<Arc<dyn Transport>, TransferError> + Send + Sync;

pub trait Transport: Send + Sync {
    /// Start sending `request`.
    ///
    /// Options that can never be honoured are rejected synchronously with a
    /// [`ConfigError`]; every other failure is reported by the future.
    fn send(
        &self,
        request: Request<Bytes>,
        options: RequestOptions,
    ) -> Result<ResponseFuture, ConfigError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(
        &self,
        request: Request<Bytes>,
        options: RequestOptions,
    ) -> Result<ResponseFuture, ConfigError> {
        (**self).send(request, options)
    }
}

/// Factory creating a fresh [`HttpTransport`] per call.
pub fn default_transport_factory() -> Arc<TransportFactory> {
    Arc::new(|| -> Result<Arc<dyn Transport>, TransferError> {
        Ok(Arc::new(HttpTransport::new()))
    })
}

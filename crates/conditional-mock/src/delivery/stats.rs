//! Transfer statistics handed to `on_stats`.

use crate::error::{RequestHead, TransferError};
use bytes::Bytes;
use hyper::{Response, Uri};
use std::time::Duration;

/// Outcome of one request as seen by the `on_stats` hook.
///
/// Exactly one of `response` and `error` is set, except for a header-hook
/// failure where the rejected response is reachable through the error.
#[derive(Debug, Clone, Copy)]
pub struct TransferStats<'a> {
    pub request: &'a RequestHead,
    pub response: Option<&'a Response<Bytes>>,
    pub transfer_time: Duration,
    pub error: Option<&'a TransferError>,
}

impl<'a> TransferStats<'a> {
    pub fn effective_uri(&self) -> &'a Uri {
        &self.request.uri
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

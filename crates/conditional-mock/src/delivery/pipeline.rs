//! Delivery of mocked responses.
//!
//! `deliver` checks the hook options synchronously and returns a future that
//! sleeps for the configured delay, runs the header hook, materializes the
//! response source and finally reports stats and fills the sink.

use super::options::{callable, HeadersHook, RequestOptions, StatsHook};
use super::sink::Sink;
use super::stats::TransferStats;
use crate::error::{BoxError, ConfigError, RequestHead, TransferError};
use crate::handler::ResponseSource;
use crate::metrics;
use crate::request::request_url;
use crate::transport::ResponseFuture;
use bytes::Bytes;
use hyper::{Request, Response};
use std::time::Duration;
use tracing::{debug, warn};

const ON_HEADERS_FAILED: &str = "An error was encountered during the on_headers event";

/// Produce the asynchronous result for a request that matched a rule.
///
/// Returns `Err` only for hook options that are not callable. Every other
/// failure is reported through the returned future.
pub fn deliver(
    request: Request<Bytes>,
    source: ResponseSource,
    options: RequestOptions,
) -> Result<ResponseFuture, ConfigError> {
    let on_headers = callable(options.on_headers.as_ref(), "on_headers")?;
    let on_stats = callable(options.on_stats.as_ref(), "on_stats")?;

    Ok(Box::pin(async move {
        if let Some(delay) = &options.delay {
            let duration = delay.duration();
            debug!(delay_ms = duration.as_millis() as u64, "Delaying mocked response");
            metrics::record_delay(duration);
            tokio::time::sleep(duration).await;
        }

        let head = RequestHead::from_request(&request);
        let outcome = materialize(&request, &head, source, on_headers.as_deref(), &options);
        if let Err(err) = &outcome {
            debug!(url = %request_url(&request), error = %err, "Mocked response rejected");
        }

        finish(
            &head,
            outcome,
            on_stats.as_deref(),
            options.transfer_time(),
            options.sink.as_ref(),
        )
        .await
    }))
}

/// Run the header hook, then turn the source into a response or a failure.
///
/// A failing hook short-circuits: factories are not called and registered
/// errors are replaced by the hook failure.
fn materialize(
    request: &Request<Bytes>,
    head: &RequestHead,
    source: ResponseSource,
    on_headers: Option<&HeadersHook>,
    options: &RequestOptions,
) -> Result<Response<Bytes>, TransferError> {
    match source {
        ResponseSource::Static(template) => {
            inspect_headers(on_headers, head, template.to_response())
        }
        ResponseSource::Factory(factory) => {
            inspect_pending(on_headers, head)?;
            factory(request, options).map_err(TransferError::Factory)
        }
        ResponseSource::Error(err) => {
            inspect_pending(on_headers, head)?;
            Err(TransferError::Mocked(err))
        }
    }
}

/// Run the header hook, downgrading the response to a failure if it errors.
pub(crate) fn inspect_headers(
    on_headers: Option<&HeadersHook>,
    head: &RequestHead,
    response: Response<Bytes>,
) -> Result<Response<Bytes>, TransferError> {
    let Some(hook) = on_headers else {
        return Ok(response);
    };

    match hook(Some(&response)) {
        Ok(()) => Ok(response),
        Err(source) => Err(header_hook_failed(head, Some(response), source)),
    }
}

/// Header hook for a source with no concrete response yet.
fn inspect_pending(
    on_headers: Option<&HeadersHook>,
    head: &RequestHead,
) -> Result<(), TransferError> {
    match on_headers {
        Some(hook) => hook(None).map_err(|source| header_hook_failed(head, None, source)),
        None => Ok(()),
    }
}

fn header_hook_failed(
    head: &RequestHead,
    response: Option<Response<Bytes>>,
    source: BoxError,
) -> TransferError {
    warn!(uri = %head.uri, error = %source, "on_headers hook failed");
    TransferError::HeaderHook {
        message: ON_HEADERS_FAILED.to_string(),
        request: Box::new(head.clone()),
        response: response.map(Box::new),
        source,
    }
}

/// Report stats on both branches and copy the body to the sink on success.
pub(crate) async fn finish(
    head: &RequestHead,
    outcome: Result<Response<Bytes>, TransferError>,
    on_stats: Option<&StatsHook>,
    transfer_time: Duration,
    sink: Option<&Sink>,
) -> Result<Response<Bytes>, TransferError> {
    match outcome {
        Ok(response) => {
            if let Some(hook) = on_stats {
                hook(&TransferStats {
                    request: head,
                    response: Some(&response),
                    transfer_time,
                    error: None,
                });
            }

            if let Some(sink) = sink {
                if let Err(err) = sink.write_body(response.body()).await {
                    warn!(?sink, error = %err, "Failed to write response body to sink");
                    metrics::record_failure("sink");
                    return Err(TransferError::Sink(err));
                }
            }
            Ok(response)
        }
        Err(err) => {
            if let Some(hook) = on_stats {
                hook(&TransferStats {
                    request: head,
                    response: None,
                    transfer_time,
                    error: Some(&err),
                });
            }
            metrics::record_failure(err.kind());
            Err(err)
        }
    }
}

//! Real HTTP transport used for requests no rule matches.

use super::{ResponseFuture, Transport};
use crate::delivery::options::callable;
use crate::delivery::pipeline::{finish, inspect_headers};
use crate::delivery::RequestOptions;
use crate::error::{ConfigError, RequestHead, TransferError};
use crate::request::request_url;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

type HttpClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// HTTP/1.1 client over plain TCP or rustls.
///
/// Honours the `timeout`, `on_headers`, `on_stats` and `sink` options. The
/// transfer time reported to `on_stats` is measured, not taken from options.
#[derive(Clone)]
pub struct HttpTransport {
    client: HttpClient,
}

impl HttpTransport {
    /// Create a transport trusting the platform's native root certificates.
    ///
    /// Without any native roots the transport still serves plain HTTP, but
    /// every HTTPS certificate fails verification.
    pub fn new() -> Self {
        let mut http_connector = HttpConnector::new();
        http_connector.set_connect_timeout(Some(CONNECT_TIMEOUT));
        http_connector.enforce_http(false);

        let builder = match hyper_rustls::HttpsConnectorBuilder::new().with_native_roots() {
            Ok(builder) => builder,
            Err(e) => {
                warn!(error = %e, "No native root certificates available for HTTPS");
                hyper_rustls::HttpsConnectorBuilder::new().with_tls_config(
                    rustls::ClientConfig::builder()
                        .with_root_certificates(rustls::RootCertStore::empty())
                        .with_no_client_auth(),
                )
            }
        };
        let https_connector = builder
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .build(https_connector);

        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        request: Request<Bytes>,
        options: RequestOptions,
    ) -> Result<ResponseFuture, ConfigError> {
        let on_headers = callable(options.on_headers.as_ref(), "on_headers")?;
        let on_stats = callable(options.on_stats.as_ref(), "on_stats")?;
        let client = self.client.clone();

        Ok(Box::pin(async move {
            let url = request_url(&request);
            let head = RequestHead::from_request(&request);
            let started = Instant::now();

            let outcome = exchange(&client, request, &url, options.timeout())
                .await
                .and_then(|response| inspect_headers(on_headers.as_deref(), &head, response));
            let elapsed = started.elapsed();

            match &outcome {
                Ok(response) => debug!(
                    url = %url,
                    status = response.status().as_u16(),
                    duration_ms = elapsed.as_millis() as u64,
                    "Passthrough request completed"
                ),
                Err(err) => warn!(url = %url, error = %err, "Passthrough request failed"),
            }

            finish(
                &head,
                outcome,
                on_stats.as_deref(),
                elapsed,
                options.sink.as_ref(),
            )
            .await
        }))
    }
}

async fn exchange(
    client: &HttpClient,
    request: Request<Bytes>,
    url: &str,
    timeout: Option<Duration>,
) -> Result<Response<Bytes>, TransferError> {
    if request.uri().scheme().is_none() || request.uri().authority().is_none() {
        return Err(TransferError::InvalidRequest {
            url: url.to_string(),
            source: "request URI must be absolute".into(),
        });
    }

    let connect_error = |source: Box<dyn std::error::Error + Send + Sync>| {
        TransferError::Connect {
            url: url.to_string(),
            source,
        }
    };

    let round_trip = async {
        let response = client
            .request(request.map(Full::new))
            .await
            .map_err(|e| connect_error(Box::new(e)))?;
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| connect_error(Box::new(e)))?
            .to_bytes();
        Ok(Response::from_parts(parts, body))
    };

    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, round_trip)
            .await
            .map_err(|_| TransferError::Timeout {
                url: url.to_string(),
                timeout,
            })?,
        None => round_trip.await,
    }
}

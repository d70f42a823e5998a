//! Minimal HTTP client that routes every request through a [`Transport`].
//!
//! The client owns request defaults (base URI, headers, options) and the
//! `http_errors` policy. Pointing it at a [`Handler`](crate::handler::Handler)
//! instead of the default [`HttpTransport`] is how requests get mocked.

use crate::definitions::load_document;
use crate::delivery::RequestOptions;
use crate::error::{ClientError, TransferError};
use crate::request::{normalize_url, request_url, RequestUrl};
use crate::transport::{HttpTransport, Transport};
use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Method, Request, Response, Uri};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Client defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base for relative request URLs
    pub base_uri: Option<String>,
    /// Turn 4xx/5xx responses into errors (default: true)
    pub http_errors: Option<bool>,
    /// Headers added to every request that does not set them
    pub headers: HashMap<String, String>,
    /// Default request options
    pub options: RequestOptions,
}

impl ClientConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let config: ClientConfig = load_document(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(base_uri) = &self.base_uri {
            let uri: Uri = base_uri
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid base_uri '{base_uri}': {e}"))?;
            if uri.scheme().is_none() || uri.authority().is_none() {
                anyhow::bail!("base_uri '{base_uri}' must be an absolute URL");
            }
        }

        for (name, value) in &self.headers {
            HeaderName::try_from(name.as_str())
                .map_err(|e| anyhow::anyhow!("Invalid header name '{name}': {e}"))?;
            HeaderValue::from_str(value)
                .map_err(|e| anyhow::anyhow!("Invalid value for header '{name}': {e}"))?;
        }
        Ok(())
    }

    /// Merge with `fallback`; values set on `self` win.
    pub fn or(mut self, fallback: &ClientConfig) -> Self {
        if self.base_uri.is_none() {
            self.base_uri = fallback.base_uri.clone();
        }
        self.http_errors = self.http_errors.or(fallback.http_errors);
        for (name, value) in &fallback.headers {
            self.headers
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        self.options = self.options.or_defaults(&fallback.options);
        self
    }

    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }

    pub fn with_http_errors(mut self, enabled: bool) -> Self {
        self.http_errors = Some(enabled);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Clone)]
pub struct Client {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Client sending real HTTP requests.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Build a request for `url`, resolved against the base URI.
    pub fn build_request(
        &self,
        method: Method,
        url: &str,
        body: Bytes,
    ) -> Result<Request<Bytes>, TransferError> {
        let url = normalize_url(&self.resolve_url(url));
        let uri: Uri = url.parse().map_err(|e| TransferError::InvalidRequest {
            url: url.clone(),
            source: Box::new(e),
        })?;

        let mut request = Request::new(body);
        *request.method_mut() = method;
        *request.uri_mut() = uri;
        request.extensions_mut().insert(RequestUrl(url));
        Ok(request)
    }

    /// Send `request` with the client defaults applied.
    pub async fn send(
        &self,
        mut request: Request<Bytes>,
        options: RequestOptions,
    ) -> Result<Response<Bytes>, ClientError> {
        let options = options.or_defaults(&self.config.options);
        self.apply_defaults(&mut request)?;

        let http_errors = options
            .extra
            .get("http_errors")
            .and_then(serde_json::Value::as_bool)
            .or(self.config.http_errors)
            .unwrap_or(true);
        let method = request.method().clone();
        let url = request_url(&request);

        let transport = options
            .transport
            .clone()
            .unwrap_or_else(|| Arc::clone(&self.transport));
        let response = transport.send(request, options)?.await?;

        let status = response.status();
        if http_errors && (status.is_client_error() || status.is_server_error()) {
            debug!(url = %url, status = status.as_u16(), "Response status treated as error");
            return Err(TransferError::Status {
                method,
                url,
                status,
                response: Box::new(response),
            }
            .into());
        }
        Ok(response)
    }

    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: impl Into<Bytes>,
        options: RequestOptions,
    ) -> Result<Response<Bytes>, ClientError> {
        let request = self.build_request(method, url, body.into())?;
        self.send(request, options).await
    }

    pub async fn get(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response<Bytes>, ClientError> {
        self.request(Method::GET, url, Bytes::new(), options).await
    }

    fn apply_defaults(&self, request: &mut Request<Bytes>) -> Result<(), TransferError> {
        if request.uri().scheme().is_none() && self.config.base_uri.is_some() {
            let url = normalize_url(&self.resolve_url(&request.uri().to_string()));
            let uri: Uri = url.parse().map_err(|e| TransferError::InvalidRequest {
                url: url.clone(),
                source: Box::new(e),
            })?;
            *request.uri_mut() = uri;
            request.extensions_mut().insert(RequestUrl(url));
        }

        let headers = request.headers_mut();
        for (name, value) in &self.config.headers {
            let (Ok(name), Ok(value)) = (
                HeaderName::try_from(name.as_str()),
                HeaderValue::from_str(value),
            ) else {
                continue;
            };
            if !headers.contains_key(&name) {
                headers.insert(name, value);
            }
        }
        Ok(())
    }

    fn resolve_url(&self, url: &str) -> String {
        match &self.config.base_uri {
            Some(base) if !url.contains("://") => join_url(base, url),
            _ => url.to_string(),
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Resolve a relative reference against `base`. An absolute path replaces the
/// base path, anything else is appended to the base's directory.
fn join_url(base: &str, reference: &str) -> String {
    if reference.is_empty() {
        return base.to_string();
    }

    let authority_start = base.find("://").map(|i| i + 3).unwrap_or(0);
    let path_start = base[authority_start..]
        .find(['/', '?', '#'])
        .map(|i| i + authority_start)
        .unwrap_or(base.len());
    let origin = &base[..path_start];

    if reference.starts_with('/') {
        return format!("{origin}{reference}");
    }
    if reference.starts_with('?') {
        let without_query = base.split(['?', '#']).next().unwrap_or(base);
        return format!("{without_query}{reference}");
    }

    let path = base[path_start..].split(['?', '#']).next().unwrap_or("");
    let directory = match path.rfind('/') {
        Some(i) => &path[..=i],
        None => "/",
    };
    format!("{origin}{directory}{reference}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ResponseFuture;
    use crate::error::ConfigError;
    use parking_lot::Mutex;

    /// Answers every request with a fixed status and records what it saw.
    #[derive(Default)]
    struct Recorder {
        status: u16,
        seen: Mutex<Vec<(String, Option<String>)>>,
    }

    impl Transport for Recorder {
        fn send(
            &self,
            request: Request<Bytes>,
            _options: RequestOptions,
        ) -> Result<ResponseFuture, ConfigError> {
            let agent = request
                .headers()
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            self.seen.lock().push((request_url(&request), agent));

            let mut response = Response::new(Bytes::from_static(b"ok"));
            *response.status_mut() = hyper::StatusCode::from_u16(self.status).unwrap();
            Ok(Box::pin(async move { Ok(response) }))
        }
    }

    fn recorder(status: u16) -> Arc<Recorder> {
        Arc::new(Recorder {
            status,
            ..Default::default()
        })
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://example.com", "/a"), "https://example.com/a");
        assert_eq!(join_url("https://example.com/v1/", "users"), "https://example.com/v1/users");
        assert_eq!(join_url("https://example.com/v1/x", "users"), "https://example.com/v1/users");
        assert_eq!(join_url("https://example.com", "users"), "https://example.com/users");
        assert_eq!(join_url("https://example.com/a?x=1", "?y=2"), "https://example.com/a?y=2");
        assert_eq!(join_url("https://example.com/a", ""), "https://example.com/a");
    }

    #[tokio::test]
    async fn test_base_uri_and_default_headers() {
        let transport = recorder(200);
        let config = ClientConfig::default()
            .with_base_uri("https://Example.com/api/")
            .with_header("User-Agent", "conditional-mock");
        let client = Client::with_transport(config, transport.clone());

        client.get("items?page=2", RequestOptions::new()).await.unwrap();
        client.get("https://other.org", RequestOptions::new()).await.unwrap();

        assert_eq!(
            transport.seen.lock().as_slice(),
            &[
                (
                    "https://example.com/api/items?page=2".to_string(),
                    Some("conditional-mock".to_string())
                ),
                (
                    "https://other.org".to_string(),
                    Some("conditional-mock".to_string())
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_http_errors() {
        let client = Client::with_transport(ClientConfig::default(), recorder(404));
        let err = client
            .get("https://example.com/missing", RequestOptions::new())
            .await
            .unwrap_err();
        match err.as_transfer() {
            Some(TransferError::Status { status, url, .. }) => {
                assert_eq!(status.as_u16(), 404);
                assert_eq!(url, "https://example.com/missing");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "GET https://example.com/missing resulted in a 404 Not Found response"
        );

        // Per-request override
        let response = client
            .get(
                "https://example.com/missing",
                RequestOptions::new().with_extra("http_errors", serde_json::json!(false)),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 404);

        // Client-level override
        let client = Client::with_transport(
            ClientConfig::default().with_http_errors(false),
            recorder(500),
        );
        assert!(client.get("https://example.com", RequestOptions::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_transport_option_overrides_client_transport() {
        let default = recorder(200);
        let per_call = recorder(200);
        let client = Client::with_transport(ClientConfig::default(), default.clone());

        client
            .get(
                "https://example.com",
                RequestOptions::new().with_transport(per_call.clone()),
            )
            .await
            .unwrap();
        assert!(default.seen.lock().is_empty());
        assert_eq!(per_call.seen.lock().len(), 1);
    }

    #[test]
    fn test_config_merge() {
        let existing = ClientConfig::default()
            .with_base_uri("https://a.example")
            .with_header("X-A", "1");
        let fallback = ClientConfig::default()
            .with_base_uri("https://b.example")
            .with_http_errors(false)
            .with_header("X-A", "2")
            .with_header("X-B", "2");

        let merged = existing.or(&fallback);
        assert_eq!(merged.base_uri.as_deref(), Some("https://a.example"));
        assert_eq!(merged.http_errors, Some(false));
        assert_eq!(merged.headers["X-A"], "1");
        assert_eq!(merged.headers["X-B"], "2");
    }

    #[test]
    fn test_config_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.yaml");
        std::fs::write(
            &path,
            "base_uri: https://example.com\nhttp_errors: false\nheaders:\n  Accept: application/json\noptions:\n  delay: 50\n  transfer_time: 0.5\n",
        )
        .unwrap();

        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.base_uri.as_deref(), Some("https://example.com"));
        assert_eq!(config.http_errors, Some(false));
        assert_eq!(config.headers["Accept"], "application/json");
        assert!(config.options.delay.is_some());
        assert_eq!(config.options.transfer_time, Some(0.5));
    }

    #[test]
    fn test_config_validation() {
        let config = ClientConfig::default().with_base_uri("/relative");
        assert!(config.validate().is_err());

        let config = ClientConfig::default().with_header("Bad Header", "x");
        assert!(config.validate().is_err());

        assert!(ClientConfig::default().validate().is_ok());
    }
}

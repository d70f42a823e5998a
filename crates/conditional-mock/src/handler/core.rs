//! The handler: resolve a request against the rules, deliver on a match and
//! pass through on a miss.

use super::registry::RuleSet;
use super::types::ResponseSource;
use crate::client::{Client, ClientConfig};
use crate::definitions::MockDefinitions;
use crate::delivery::{deliver, RequestOptions};
use crate::error::ConfigError;
use crate::metrics;
use crate::request::request_url;
use crate::transport::{default_transport_factory, ResponseFuture, Transport, TransportFactory};
use anyhow::Context;
use bytes::Bytes;
use hyper::Request;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Handler {
    rules: Mutex<RuleSet>,
    /// Builds the real transport for unmatched requests, once per request.
    passthrough: Arc<TransportFactory>,
}

impl Default for Handler {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler {
    /// Handler passing unmatched requests to a fresh [`HttpTransport`](crate::transport::HttpTransport).
    pub fn new() -> Self {
        Self::with_passthrough(default_transport_factory())
    }

    pub fn with_passthrough(passthrough: Arc<TransportFactory>) -> Self {
        Self {
            rules: Mutex::new(RuleSet::new()),
            passthrough,
        }
    }

    /// Register `source` for `key`, a literal URL or a delimited pattern.
    ///
    /// Replaces an existing rule with the same key. URLs that were already
    /// resolved keep their cached source until removed or reset.
    pub fn add_response(&self, key: impl Into<String>, source: impl Into<ResponseSource>) -> &Self {
        self.rules.lock().add(key.into(), source.into());
        self
    }

    pub fn remove_response(&self, key: &str) -> &Self {
        self.rules.lock().remove(key);
        debug!(key = %key, "Removed response rule");
        self
    }

    pub fn reset_responses(&self) -> &Self {
        self.rules.lock().reset();
        debug!("Reset all response rules");
        self
    }

    /// Register every entry of a definitions file.
    pub fn load_responses<P: AsRef<Path>>(&self, path: P) -> Result<&Self, anyhow::Error> {
        let path = path.as_ref();
        let definitions = MockDefinitions::from_file(path)?;
        for entry in &definitions.responses {
            let source = entry
                .source()
                .with_context(|| format!("Invalid entry in {}", path.display()))?;
            self.add_response(entry.url.clone(), source);
        }
        info!(
            path = %path.display(),
            count = definitions.responses.len(),
            "Loaded mock responses"
        );
        Ok(self)
    }

    /// Answer `request` from the rules, or forward it when nothing matches.
    pub fn handle(
        &self,
        request: Request<Bytes>,
        options: RequestOptions,
    ) -> Result<ResponseFuture, ConfigError> {
        let url = request_url(&request);
        let resolved = self.rules.lock().resolve(&url);

        match resolved {
            Some((source, resolution)) => {
                debug!(
                    url = %url,
                    resolution = resolution.as_str(),
                    source = source.kind(),
                    "Intercepted request"
                );
                metrics::record_request("intercepted");
                deliver(request, source, options)
            }
            None => {
                debug!(url = %url, "No rule matched, passing request through");
                metrics::record_request("passthrough");
                match (self.passthrough)() {
                    Ok(transport) => transport.send(request, options.without_transport()),
                    Err(err) => {
                        warn!(url = %url, error = %err, "Failed to create passthrough transport");
                        metrics::record_failure(err.kind());
                        Ok(Box::pin(futures::future::ready(Err(err))))
                    }
                }
            }
        }
    }

    /// Build a client whose requests all go through a new handler.
    ///
    /// Settings of `existing` take precedence over `config`.
    pub fn initialize_with_client(
        existing: Option<&Client>,
        config: ClientConfig,
    ) -> (Client, Arc<Handler>) {
        let handler = Arc::new(Handler::new());
        let client = handler.wrap_client(existing, config);
        (client, handler)
    }

    /// Same as [`initialize_with_client`](Self::initialize_with_client) for an
    /// existing handler.
    pub fn wrap_client(self: &Arc<Self>, existing: Option<&Client>, config: ClientConfig) -> Client {
        let config = match existing {
            Some(client) => client.config().clone().or(&config),
            None => config,
        };
        Client::with_transport(config, Arc::clone(self) as Arc<dyn Transport>)
    }

    pub fn literal_count(&self) -> usize {
        self.rules.lock().literal_count()
    }

    pub fn pattern_count(&self) -> usize {
        self.rules.lock().pattern_count()
    }
}

impl Transport for Handler {
    fn send(
        &self,
        request: Request<Bytes>,
        options: RequestOptions,
    ) -> Result<ResponseFuture, ConfigError> {
        self.handle(request, options)
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rules = self.rules.lock();
        f.debug_struct("Handler")
            .field("literal_rules", &rules.literal_count())
            .field("pattern_rules", &rules.pattern_count())
            .field("cached_urls", &rules.cached_count())
            .finish()
    }
}

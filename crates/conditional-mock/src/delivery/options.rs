//! Per-request options.
//!
//! Options can be built in code or deserialized from JSON/YAML. Hooks that
//! arrive through deserialization are plain data and fail the callable check
//! when a request is delivered.

use super::sink::Sink;
use super::stats::TransferStats;
use crate::error::{BoxError, ConfigError};
use crate::transport::Transport;
use bytes::Bytes;
use hyper::Response;
use rand::Rng;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Inspects a response before it is returned. An error turns the delivery into a failure.
///
/// The hook sees `None` when the matched rule is a factory that has not run
/// yet or a registered error.
pub type HeadersHook = dyn Fn(Option<&Response<Bytes>>) -> Result<(), BoxError> + Send + Sync;

/// Receives transfer statistics once per request.
pub type StatsHook = dyn Fn(&TransferStats<'_>) + Send + Sync;

/// A hook option: either a function, or a value that was supplied where a
/// function was expected.
pub enum Hook<F: ?Sized> {
    Callable(Arc<F>),
    NotCallable(serde_json::Value),
}

impl<F: ?Sized> Clone for Hook<F> {
    fn clone(&self) -> Self {
        match self {
            Hook::Callable(f) => Hook::Callable(Arc::clone(f)),
            Hook::NotCallable(value) => Hook::NotCallable(value.clone()),
        }
    }
}

impl<F: ?Sized> fmt::Debug for Hook<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Callable(_) => f.write_str("Callable(..)"),
            Hook::NotCallable(value) => f.debug_tuple("NotCallable").field(value).finish(),
        }
    }
}

impl<'de, F: ?Sized> Deserialize<'de> for Hook<F> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(Hook::NotCallable)
    }
}

/// Resolve an optional hook to its function, failing for non-callable values.
pub(crate) fn callable<F: ?Sized>(
    hook: Option<&Hook<F>>,
    name: &'static str,
) -> Result<Option<Arc<F>>, ConfigError> {
    match hook {
        None => Ok(None),
        Some(Hook::Callable(f)) => Ok(Some(Arc::clone(f))),
        Some(Hook::NotCallable(_)) => Err(ConfigError::NotCallable(name)),
    }
}

/// Artificial latency before a mocked response is delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum Delay {
    /// Fixed delay in milliseconds
    Fixed(f64),
    /// Uniformly random delay within `min_ms..=max_ms`
    Range { min_ms: u64, max_ms: u64 },
}

impl Delay {
    pub fn range(min_ms: u64, max_ms: u64) -> Self {
        Delay::Range {
            min_ms: min_ms.min(max_ms),
            max_ms: min_ms.max(max_ms),
        }
    }

    /// Interpret an option value. Numbers and numeric strings are fixed delays,
    /// `{min, max}` objects are ranges; anything else is not a delay.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_f64().map(Delay::Fixed),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok().map(Delay::Fixed),
            serde_json::Value::Object(map) => {
                let min = map.get("min")?.as_u64()?;
                let max = map.get("max")?.as_u64()?;
                Some(Delay::range(min, max))
            }
            _ => None,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Delay::Fixed(ms) => Duration::try_from_secs_f64(ms / 1000.0).unwrap_or_default(),
            Delay::Range { min_ms, max_ms } => {
                Duration::from_millis(rand::thread_rng().gen_range(*min_ms..=*max_ms))
            }
        }
    }
}

fn lenient_delay<'de, D>(deserializer: D) -> Result<Option<Delay>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Delay::from_value))
}

/// Options recognized by the handler and the transports.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    #[serde(deserialize_with = "lenient_delay")]
    pub delay: Option<Delay>,
    pub on_headers: Option<Hook<HeadersHook>>,
    pub on_stats: Option<Hook<StatsHook>>,
    pub sink: Option<Sink>,
    /// Seconds reported to `on_stats` for mocked responses
    pub transfer_time: Option<f64>,
    /// Seconds; only the real transport enforces it
    pub timeout: Option<f64>,
    /// Transport override. Cleared before a request is passed through.
    #[serde(skip)]
    pub transport: Option<Arc<dyn Transport>>,
    /// Any other option, carried along untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Some(Delay::Fixed(ms as f64));
        self
    }

    pub fn with_delay(mut self, delay: Delay) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn on_headers<F>(mut self, hook: F) -> Self
    where
        F: Fn(Option<&Response<Bytes>>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.on_headers = Some(Hook::Callable(Arc::new(hook)));
        self
    }

    pub fn on_stats<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TransferStats<'_>) + Send + Sync + 'static,
    {
        self.on_stats = Some(Hook::Callable(Arc::new(hook)));
        self
    }

    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_transfer_time(mut self, seconds: f64) -> Self {
        self.transfer_time = Some(seconds);
        self
    }

    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Drop the transport override.
    pub fn without_transport(mut self) -> Self {
        self.transport = None;
        self
    }

    /// Transfer time reported for mocked responses (zero when unset or invalid).
    pub fn transfer_time(&self) -> Duration {
        self.transfer_time
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or_default()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .filter(|timeout| !timeout.is_zero())
    }

    /// Fill every unset option from `defaults`. Explicit values win, `extra`
    /// keys are merged.
    pub fn or_defaults(mut self, defaults: &RequestOptions) -> Self {
        if self.delay.is_none() {
            self.delay = defaults.delay.clone();
        }
        if self.on_headers.is_none() {
            self.on_headers = defaults.on_headers.clone();
        }
        if self.on_stats.is_none() {
            self.on_stats = defaults.on_stats.clone();
        }
        if self.sink.is_none() {
            self.sink = defaults.sink.clone();
        }
        self.transfer_time = self.transfer_time.or(defaults.transfer_time);
        self.timeout = self.timeout.or(defaults.timeout);
        if self.transport.is_none() {
            self.transport = defaults.transport.clone();
        }
        for (key, value) in &defaults.extra {
            self.extra
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("delay", &self.delay)
            .field("on_headers", &self.on_headers)
            .field("on_stats", &self.on_stats)
            .field("sink", &self.sink)
            .field("transfer_time", &self.transfer_time)
            .field("timeout", &self.timeout)
            .field("transport", &self.transport.as_ref().map(|_| ".."))
            .field("extra", &self.extra)
            .finish()
    }
}

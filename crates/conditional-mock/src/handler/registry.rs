//! Rule storage and URL resolution.
//!
//! Literal rules and pattern rules live in separate collections. Resolution
//! consults the per-URL cache, then literal rules, then pattern rules in
//! registration order, and remembers the first hit for that URL.
//!
//! The cache is only invalidated by `remove` (for the removed key) and `reset`
//! (entirely). Adding a rule never evicts a URL that is already cached.

use super::types::ResponseSource;
use crate::matcher::UrlPattern;
use crate::metrics;
use std::collections::HashMap;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
struct PatternRule {
    pattern: UrlPattern,
    source: ResponseSource,
}

/// How a URL was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    CacheHit,
    Literal,
    Pattern,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::CacheHit => "cache_hit",
            Resolution::Literal => "literal",
            Resolution::Pattern => "pattern",
        }
    }
}

#[derive(Debug, Default)]
pub struct RuleSet {
    literal: HashMap<String, ResponseSource>,
    /// Registration order decides precedence among patterns.
    patterns: Vec<PatternRule>,
    cache: HashMap<String, ResponseSource>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `source` under `key`, classifying the key once.
    pub fn add(&mut self, key: String, source: ResponseSource) {
        match UrlPattern::parse(&key) {
            Ok(pattern) => {
                debug!(key = %key, kind = source.kind(), "Registered pattern rule");
                match self
                    .patterns
                    .iter_mut()
                    .find(|rule| rule.pattern.as_str() == key)
                {
                    Some(existing) => existing.source = source,
                    None => self.patterns.push(PatternRule { pattern, source }),
                }
            }
            Err(reason) => {
                debug!(key = %key, kind = source.kind(), %reason, "Registered literal rule");
                self.literal.insert(key, source);
            }
        }
    }

    /// Remove `key` from both rule collections and drop its cache entry.
    pub fn remove(&mut self, key: &str) {
        self.literal.remove(key);
        self.patterns.retain(|rule| rule.pattern.as_str() != key);
        self.cache.remove(key);
    }

    pub fn reset(&mut self) {
        self.literal.clear();
        self.patterns.clear();
        self.cache.clear();
    }

    /// Find the source for `url`, populating the cache on a rule hit.
    pub fn resolve(&mut self, url: &str) -> Option<(ResponseSource, Resolution)> {
        let resolved = self.lookup(url);
        let label = resolved
            .as_ref()
            .map(|(_, how)| how.as_str())
            .unwrap_or("miss");
        metrics::record_resolution(label);
        resolved
    }

    fn lookup(&mut self, url: &str) -> Option<(ResponseSource, Resolution)> {
        if let Some(source) = self.cache.get(url) {
            trace!(url = %url, "Resolution cache hit");
            return Some((source.clone(), Resolution::CacheHit));
        }

        if let Some(source) = self.literal.get(url) {
            let source = source.clone();
            self.cache.insert(url.to_string(), source.clone());
            return Some((source, Resolution::Literal));
        }

        let source = self
            .patterns
            .iter()
            .find(|rule| rule.pattern.is_match(url))
            .map(|rule| rule.source.clone())?;
        self.cache.insert(url.to_string(), source.clone());
        Some((source, Resolution::Pattern))
    }

    pub fn literal_count(&self) -> usize {
        self.literal.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literal.is_empty() && self.patterns.is_empty()
    }

    /// Pattern keys in precedence order.
    pub fn pattern_keys(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|rule| rule.pattern.as_str())
    }
}

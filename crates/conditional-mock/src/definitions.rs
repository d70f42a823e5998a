//! Mock definition files.
//!
//! A definitions file registers rules in bulk:
//!
//! ```yaml
//! responses:
//!   - url: https://example.com
//!     response:
//!       statusCode: 200
//!       body: A
//!   - url: '~httpbin\.org~i'
//!     error: connection refused
//! ```
//!
//! YAML and JSON are both accepted; the format follows the file extension.

use crate::error::MockedError;
use crate::handler::{ResponseSource, ResponseTemplate};
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockDefinitions {
    #[serde(default)]
    pub responses: Vec<ResponseEntry>,
}

/// One rule: a URL key and either a response or an error message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEntry {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEntry {
    pub fn source(&self) -> anyhow::Result<ResponseSource> {
        match (&self.response, &self.error) {
            (Some(template), None) => Ok(ResponseSource::Static(template.clone())),
            (None, Some(message)) => Ok(ResponseSource::error(MockedError::new(message.clone()))),
            (Some(_), Some(_)) => anyhow::bail!(
                "Entry for '{}' sets both 'response' and 'error'; pick one",
                self.url
            ),
            (None, None) => {
                anyhow::bail!("Entry for '{}' needs a 'response' or an 'error'", self.url)
            }
        }
    }
}

impl MockDefinitions {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let definitions: MockDefinitions = load_document(path)?;
        definitions
            .validate()
            .with_context(|| format!("Invalid mock definitions in {}", path.display()))?;
        Ok(definitions)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        for entry in &self.responses {
            if entry.url.is_empty() {
                anyhow::bail!("Response entries must have a non-empty 'url'");
            }
            entry.source()?;
        }
        Ok(())
    }
}

/// Read a YAML or JSON document, picking the parser from the file extension.
pub(crate) fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, anyhow::Error> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("json") => serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON in {}", path.display())),
        Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML in {}", path.display())),
        other => anyhow::bail!(
            "Unsupported file extension {:?} for {}; expected .json, .yaml or .yml",
            other.unwrap_or(""),
            path.display()
        ),
    }
}

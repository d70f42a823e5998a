//! Response sources registered against rules.

use crate::delivery::RequestOptions;
use crate::error::BoxError;
use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

fn default_status_code() -> u16 {
    200
}

/// Static response description. A fresh `Response` is built on every delivery.
///
/// A string body is sent as-is; any other JSON body is serialized and gets
/// `Content-Type: application/json` unless a content type header is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseTemplate {
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl Default for ResponseTemplate {
    fn default() -> Self {
        Self::new(default_status_code())
    }
}

impl ResponseTemplate {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(serde_json::Value::String(body.into()));
        self
    }

    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    fn has_content_type(&self) -> bool {
        self.headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case(CONTENT_TYPE.as_str()))
    }

    /// Build the response. Unknown status codes become 500, header entries that
    /// are not valid HTTP are skipped.
    pub fn to_response(&self) -> Response<Bytes> {
        let mut json_body = false;
        let body = match &self.body {
            None => Bytes::new(),
            Some(serde_json::Value::String(s)) => Bytes::from(s.clone()),
            Some(other) => {
                json_body = true;
                Bytes::from(serde_json::to_vec(other).unwrap_or_default())
            }
        };

        let mut response = Response::new(body);
        *response.status_mut() =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let headers = response.headers_mut();
        for (key, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::try_from(key.as_str()),
                HeaderValue::from_str(value),
            ) {
                headers.append(name, value);
            }
        }
        if json_body && !self.has_content_type() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        response
    }
}

/// Callable computing a response from the request and its options.
pub type ResponseFactory =
    dyn Fn(&Request<Bytes>, &RequestOptions) -> Result<Response<Bytes>, BoxError> + Send + Sync;

/// What a rule answers with.
#[derive(Clone)]
pub enum ResponseSource {
    Static(ResponseTemplate),
    Factory(Arc<ResponseFactory>),
    Error(Arc<dyn StdError + Send + Sync>),
}

impl ResponseSource {
    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(&Request<Bytes>, &RequestOptions) -> Result<Response<Bytes>, BoxError>
            + Send
            + Sync
            + 'static,
    {
        ResponseSource::Factory(Arc::new(f))
    }

    pub fn error<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        ResponseSource::Error(Arc::new(err))
    }

    /// True when both values are the same registered source: equal templates,
    /// or the same factory/error allocation.
    pub fn same_as(&self, other: &ResponseSource) -> bool {
        match (self, other) {
            (ResponseSource::Static(a), ResponseSource::Static(b)) => a == b,
            (ResponseSource::Factory(a), ResponseSource::Factory(b)) => Arc::ptr_eq(a, b),
            (ResponseSource::Error(a), ResponseSource::Error(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResponseSource::Static(_) => "static",
            ResponseSource::Factory(_) => "factory",
            ResponseSource::Error(_) => "error",
        }
    }
}

impl From<ResponseTemplate> for ResponseSource {
    fn from(template: ResponseTemplate) -> Self {
        ResponseSource::Static(template)
    }
}

impl fmt::Debug for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseSource::Static(template) => f.debug_tuple("Static").field(template).finish(),
            ResponseSource::Factory(_) => f.write_str("Factory(..)"),
            ResponseSource::Error(err) => f.debug_tuple("Error").field(&err.to_string()).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MockedError;

    #[test]
    fn test_template_string_body() {
        let response = ResponseTemplate::new(200)
            .with_body("This is a test")
            .to_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), &Bytes::from_static(b"This is a test"));
        assert!(response.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_template_json_body_sets_content_type() {
        let response = ResponseTemplate::new(201)
            .with_json(serde_json::json!({"ok": true}))
            .to_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(response.body(), &Bytes::from_static(br#"{"ok":true}"#));
    }

    #[test]
    fn test_template_keeps_explicit_content_type() {
        let response = ResponseTemplate::new(200)
            .with_header("content-type", "application/vnd.api+json")
            .with_json(serde_json::json!([1, 2]))
            .to_response();
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/vnd.api+json"
        );
    }

    #[test]
    fn test_template_invalid_status_and_header() {
        let response = ResponseTemplate::new(1000)
            .with_header("bad header", "x")
            .with_header("X-Ok", "yes")
            .to_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers().len(), 1);
        assert_eq!(response.headers().get("x-ok").unwrap(), "yes");
    }

    #[test]
    fn test_template_serde_defaults() {
        let template: ResponseTemplate = serde_json::from_str(r#"{"body": "hi"}"#).unwrap();
        assert_eq!(template.status_code, 200);
        assert!(template.headers.is_empty());

        let template: ResponseTemplate =
            serde_yaml::from_str("statusCode: 404\nheaders:\n  X-Reason: missing\n").unwrap();
        assert_eq!(template.status_code, 404);
        assert_eq!(template.headers["X-Reason"], "missing");
    }

    #[test]
    fn test_source_identity() {
        let factory = ResponseSource::factory(|_, _| Ok(Response::new(Bytes::new())));
        assert!(factory.same_as(&factory.clone()));
        let other = ResponseSource::factory(|_, _| Ok(Response::new(Bytes::new())));
        assert!(!factory.same_as(&other));

        let error = ResponseSource::error(MockedError::new("down"));
        assert!(error.same_as(&error.clone()));
        assert_eq!(format!("{error:?}"), r#"Error("down")"#);
        assert_eq!(error.kind(), "error");
    }
}

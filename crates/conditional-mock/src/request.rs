//! Request URL extraction.
//!
//! Rules are matched against the full URL string of a request. `hyper::Uri`
//! renders a missing path as `/`, so a client that builds requests attaches
//! the URL it was given as a [`RequestUrl`] extension and the handler prefers
//! that over re-rendering the URI.

use hyper::Request;

/// URL string exactly as the caller supplied it (after normalization).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUrl(pub String);

/// Full URL of `request`: scheme, host, path and query.
pub fn request_url<B>(request: &Request<B>) -> String {
    match request.extensions().get::<RequestUrl>() {
        Some(RequestUrl(url)) => url.clone(),
        None => normalize_url(&request.uri().to_string()),
    }
}

/// Lowercase the scheme and host of an absolute URL and drop the scheme's
/// default port (`:80` for http, `:443` for https). Path, query and user info
/// keep their case. Relative references are returned unchanged.
pub fn normalize_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let (scheme, rest) = url.split_at(scheme_end);
    let rest = &rest[3..];

    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);
    let (user_info, host) = match authority.rfind('@') {
        Some(at) => authority.split_at(at + 1),
        None => ("", authority),
    };

    let scheme = scheme.to_ascii_lowercase();
    let mut host = host.to_ascii_lowercase();
    let default_port = match scheme.as_str() {
        "http" => Some(":80"),
        "https" => Some(":443"),
        _ => None,
    };
    if let Some(port) = default_port {
        if let Some(stripped) = host.strip_suffix(port) {
            host = stripped.to_string();
        }
    }

    format!("{scheme}://{user_info}{host}{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_scheme_and_host() {
        assert_eq!(
            normalize_url("HTTPS://www.HTTPBIN.org/Get?Q=A"),
            "https://www.httpbin.org/Get?Q=A"
        );
        assert_eq!(
            normalize_url("http://User@Example.COM:8080"),
            "http://User@example.com:8080"
        );
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
        assert_eq!(normalize_url("/relative/Path"), "/relative/Path");
    }

    #[test]
    fn test_normalize_drops_default_port() {
        assert_eq!(
            normalize_url("https://Example.com:443/a"),
            "https://example.com/a"
        );
        assert_eq!(normalize_url("http://example.com:80?q=1"), "http://example.com?q=1");
        assert_eq!(normalize_url("http://[::1]:80/"), "http://[::1]/");
        assert_eq!(
            normalize_url("http://example.com:443/a"),
            "http://example.com:443/a"
        );
        assert_eq!(
            normalize_url("https://example.com:8443/a"),
            "https://example.com:8443/a"
        );
    }

    #[test]
    fn test_request_url_prefers_extension() {
        let mut request = Request::get("https://example.com").body(()).unwrap();
        request
            .extensions_mut()
            .insert(RequestUrl("https://example.com".to_string()));
        assert_eq!(request_url(&request), "https://example.com");
    }

    #[test]
    fn test_request_url_from_uri() {
        let request = Request::get("https://www.HTTPBIN.org/get?test=1")
            .body(())
            .unwrap();
        assert_eq!(request_url(&request), "https://www.httpbin.org/get?test=1");
    }
}

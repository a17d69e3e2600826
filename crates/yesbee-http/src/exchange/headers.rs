//! The `http::` header namespace.
//!
//! Every piece of HTTP metadata that crosses the boundary between the HTTP
//! layer and the rest of the pipeline is an exchange header carrying the
//! `http::` prefix. Raw HTTP headers are stored under the same prefix with
//! their lowercase names.

use super::Exchange;
use hyper::header::{HeaderName, HeaderValue};
use hyper::HeaderMap;
use tracing::debug;

pub const NAMESPACE: &str = "http::";

pub const SERVER: &str = "http::server";
pub const HANDLER: &str = "http::handler";
pub const VERSION: &str = "http::version";
pub const REQUEST_METHOD: &str = "http::request-method";
pub const REQUEST_URL: &str = "http::request-url";
pub const QUERY_STRING: &str = "http::query-string";
pub const TRANSLATED_PATH: &str = "http::translated-path";
pub const TRANSLATED_URI: &str = "http::translated-uri";
pub const STATUS_CODE: &str = "http::status-code";
pub const CONTENT_TYPE: &str = "http::content-type";

/// Namespaced keys that describe the exchange rather than mirror a raw
/// HTTP header. They are never sent upstream as headers.
pub const METADATA_KEYS: [&str; 8] = [
    HANDLER,
    VERSION,
    REQUEST_METHOD,
    REQUEST_URL,
    QUERY_STRING,
    TRANSLATED_PATH,
    TRANSLATED_URI,
    STATUS_CODE,
];

/// Prefix a bare header name with the namespace.
pub fn namespaced(name: &str) -> String {
    format!("{NAMESPACE}{name}")
}

/// Strip the namespace from a key, or `None` if the key is outside it.
pub fn strip_namespace(key: &str) -> Option<&str> {
    key.strip_prefix(NAMESPACE)
}

/// Copy every header of `headers` onto the exchange under the namespace.
///
/// Repeated headers are joined with `", "`, matching how they would be
/// folded on the wire.
pub fn import_headers(exchange: &mut Exchange, headers: &HeaderMap) {
    for name in headers.keys() {
        exchange.set_header(namespaced(name.as_str()), joined_values(headers, name));
    }
}

/// Copy an upstream response's headers onto the exchange.
///
/// The request's content type is dropped first so it never describes the
/// response. Names that collide with listener metadata, `server` included,
/// keep their listener value.
pub fn import_response_headers(exchange: &mut Exchange, headers: &HeaderMap) {
    exchange.remove_header(CONTENT_TYPE);
    for name in headers.keys() {
        let key = namespaced(name.as_str());
        if key == SERVER || METADATA_KEYS.contains(&key.as_str()) {
            continue;
        }
        exchange.set_header(key, joined_values(headers, name));
    }
}

fn joined_values(headers: &HeaderMap, name: &HeaderName) -> String {
    headers
        .get_all(name)
        .iter()
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build an outbound header map from the exchange's namespaced headers.
///
/// Metadata keys and the names listed in `excluded` are skipped, as are keys
/// or values that are not valid HTTP.
pub fn export_headers(exchange: &Exchange, excluded: &[&str]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (key, value) in exchange.headers() {
        if METADATA_KEYS.contains(&key.as_str()) {
            continue;
        }
        let Some(name) = strip_namespace(key) else {
            continue;
        };
        if excluded.iter().any(|skip| skip.eq_ignore_ascii_case(name)) {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => debug!("Skipping header '{}' that is not valid HTTP", name),
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_round_trip() {
        assert_eq!(namespaced("content-type"), "http::content-type");
        assert_eq!(strip_namespace("http::content-type"), Some("content-type"));
        assert_eq!(strip_namespace("content-type"), None);
        assert_eq!(namespaced("status-code"), STATUS_CODE);
    }

    #[test]
    fn test_import_joins_repeated_headers() {
        let mut headers = HeaderMap::new();
        headers.append("accept", HeaderValue::from_static("text/html"));
        headers.append("accept", HeaderValue::from_static("application/json"));
        headers.insert("x-trace", HeaderValue::from_static("abc"));

        let mut exchange = Exchange::new();
        import_headers(&mut exchange, &headers);

        assert_eq!(
            exchange.header("http::accept"),
            Some("text/html, application/json")
        );
        assert_eq!(exchange.header("http::x-trace"), Some("abc"));
    }

    #[test]
    fn test_response_import_keeps_listener_metadata() {
        let mut exchange = Exchange::new();
        exchange.set_header(SERVER, "http://127.0.0.1:3000");
        exchange.set_header(CONTENT_TYPE, "text/plain");

        let mut headers = HeaderMap::new();
        headers.insert("server", HeaderValue::from_static("upstream/1.0"));
        headers.insert("x-upstream", HeaderValue::from_static("yes"));
        import_response_headers(&mut exchange, &headers);

        assert_eq!(exchange.header(SERVER), Some("http://127.0.0.1:3000"));
        assert_eq!(exchange.header(CONTENT_TYPE), None);
        assert_eq!(exchange.header("http::x-upstream"), Some("yes"));

        headers.insert("content-type", HeaderValue::from_static("application/xml"));
        import_response_headers(&mut exchange, &headers);
        assert_eq!(exchange.header(CONTENT_TYPE), Some("application/xml"));
    }

    #[test]
    fn test_export_skips_excluded_and_metadata() {
        let mut exchange = Exchange::new();
        exchange.set_header("http::host", "client.example");
        exchange.set_header("http::server", "127.0.0.1:3000");
        exchange.set_header("http::x-api-key", "secret");
        exchange.set_header(REQUEST_METHOD, "POST");
        exchange.set_header(TRANSLATED_URI, "/users");
        exchange.set_header("unrelated", "value");

        let headers = export_headers(&exchange, &["host", "server"]);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("x-api-key").unwrap(), "secret");
        assert!(headers.get("host").is_none());
        assert!(headers.get("request-method").is_none());
    }

    #[test]
    fn test_export_skips_invalid_header_values() {
        let mut exchange = Exchange::new();
        exchange.set_header("http::x-bad", "line\nbreak");
        exchange.set_header("http::x-good", "fine");

        let headers = export_headers(&exchange, &[]);
        assert!(headers.get("x-bad").is_none());
        assert_eq!(headers.get("x-good").unwrap(), "fine");
    }
}

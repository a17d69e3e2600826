//! Origin parsing: the (protocol, host, port) triple a listener binds to.

use crate::error::GatewayError;
use hyper::Uri;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    pub protocol: String,
    pub host: String,
    pub port: u16,
}

impl Origin {
    /// Split a uri into its origin and its path. The path is returned as
    /// written; route normalization happens in the route table.
    pub fn parse(uri: &str) -> Result<(Origin, String), GatewayError> {
        let parsed: Uri = uri
            .trim()
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| {
                GatewayError::InvalidUri(uri.to_string(), e.to_string())
            })?;

        let protocol = parsed.scheme_str().unwrap_or("http").to_ascii_lowercase();
        let host = parsed
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| GatewayError::InvalidUri(uri.to_string(), "missing host".into()))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = parsed.port_u16().unwrap_or(match protocol.as_str() {
            "https" => 443,
            _ => 80,
        });
        let path = match parsed.path() {
            "" => "/".to_string(),
            path => path.to_string(),
        };

        Ok((
            Origin {
                protocol,
                host,
                port,
            },
            path,
        ))
    }

    /// `protocol://host:port`, the key listeners are registered under.
    pub fn id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", self.protocol, self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", self.protocol, self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_port_and_path() {
        let (origin, path) = Origin::parse("http://127.0.0.1:3000/echo").unwrap();
        assert_eq!(origin.protocol, "http");
        assert_eq!(origin.host, "127.0.0.1");
        assert_eq!(origin.port, 3000);
        assert_eq!(path, "/echo");
        assert_eq!(origin.id(), "http://127.0.0.1:3000");
    }

    #[test]
    fn test_default_ports() {
        let (origin, path) = Origin::parse("http://localhost").unwrap();
        assert_eq!(origin.port, 80);
        assert_eq!(path, "/");
        let (origin, _) = Origin::parse("https://localhost/x").unwrap();
        assert_eq!(origin.port, 443);
    }

    #[test]
    fn test_same_origin_for_different_paths() {
        let (a, _) = Origin::parse("http://127.0.0.1:3000/a").unwrap();
        let (b, _) = Origin::parse("http://127.0.0.1:3000/b/c").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ipv6_host() {
        let (origin, _) = Origin::parse("http://[::1]:8080/").unwrap();
        assert_eq!(origin.host, "::1");
        assert_eq!(origin.id(), "http://[::1]:8080");
    }

    #[test]
    fn test_invalid_uri() {
        let err = Origin::parse("http://exa mple.com/").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidUri(..)));
        assert!(Origin::parse("/only/a/path").is_err());
    }
}

//! Error types for the HTTP gateway.
//!
//! Only setup-time and invocation-fatal failures are represented here.
//! Per-request transport failures never become a `GatewayError`; they are
//! recorded on the exchange (see [`crate::exchange::ExchangeError`]).

use crate::exchange::ExchangeId;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A collaborator service required by a component is not registered.
    #[error("Service \"{0}\" is not running")]
    ServiceUnavailable(&'static str),
    #[error("Invalid uri '{0}': {1}")]
    InvalidUri(String, String),
    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),
    #[error("Failed to bind {0}: {1}")]
    Bind(String, #[source] std::io::Error),
    /// Proxy mode was requested for an exchange whose body is not a stream.
    #[error("Proxy mode requires a streamed body, got {0} body")]
    UnsupportedMode(&'static str),
    #[error("No pending scope for exchange {0}")]
    ScopeNotFound(ExchangeId),
    #[error("Client for exchange {0} went away before the response was written")]
    ResponderGone(ExchangeId),
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid HTTP message: {0}")]
    Http(#[from] hyper::http::Error),
}

impl GatewayError {
    /// True for errors that must stop setup rather than a single request.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            GatewayError::ServiceUnavailable(_)
                | GatewayError::InvalidUri(..)
                | GatewayError::UnsupportedProtocol(_)
                | GatewayError::Bind(..)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_unavailable_message() {
        let err = GatewayError::ServiceUnavailable("http");
        assert_eq!(err.to_string(), "Service \"http\" is not running");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_unsupported_mode_is_not_configuration() {
        let err = GatewayError::UnsupportedMode("text");
        assert!(!err.is_configuration());
        assert!(err.to_string().contains("text"));
    }
}

//! Outbound HTTP client creation.

use crate::config::ClientConfig;
use crate::exchange::StreamBody;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::info;

/// Pooled HTTP/1.1 client used by sink components.
pub type HttpClient = Client<HttpConnector, StreamBody>;

/// Create a pooled client.
///
/// When `timeout` is given, the connect timeout is capped at it so that an
/// unreachable upstream fails no later than the request deadline.
pub fn create_http_client(config: &ClientConfig, timeout: Option<Duration>) -> HttpClient {
    let mut connect_timeout = Duration::from_secs(config.connect_timeout_secs);
    if let Some(timeout) = timeout {
        connect_timeout = connect_timeout.min(timeout);
    }

    let mut connector = HttpConnector::new();
    connector.set_keepalive(Some(Duration::from_secs(config.keepalive_timeout_secs)));
    connector.set_connect_timeout(Some(connect_timeout));
    connector.set_nodelay(true);

    let client = Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .pool_max_idle_per_host(config.max_idle_per_host)
        .build(connector);

    info!(
        "Connection pool configured: max_idle={}, idle_timeout={}s, connect_timeout={}ms",
        config.max_idle_per_host,
        config.idle_timeout_secs,
        connect_timeout.as_millis()
    );

    client
}

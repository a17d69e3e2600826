//! Outbound calls made by sink components.
//!
//! Proxy mode streams the inbound request to `base + translated-uri` and
//! hands the upstream response stream back to the exchange. Generic mode
//! sends the exchange body to the configured uri and buffers the reply.
//!
//! The timeout bounds the whole call in generic mode. In proxy mode it bounds
//! the wait for response headers and then every gap between body frames.
//!
//! Transport failures never surface as `Err`: they are recorded on the
//! exchange so the listener answers with a JSON error.

use super::client::HttpClient;
use super::idle::IdleTimeoutBody;
use crate::error::GatewayError;
use crate::exchange::body::full;
use crate::exchange::headers::{
    export_headers, import_response_headers, QUERY_STRING, REQUEST_METHOD, STATUS_CODE,
    TRANSLATED_URI,
};
use crate::exchange::{Body, BoxError, Exchange, ExchangeError};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Method, Request, Response};
use std::error::Error as StdError;
use std::io;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Body placed on the exchange when the upstream timed out or reset the
/// connection.
pub const RESET_SENTINEL: &str = "ECONNRESET";

/// Headers never forwarded to an upstream in proxy mode.
const EXCLUDED_HEADERS: [&str; 2] = ["host", "server"];

enum Outcome {
    Response(Response<Incoming>),
    Failed { message: String, reset: bool },
}

/// Proxy the exchange's streamed request body to `base_uri`.
pub(crate) async fn proxy(
    client: &HttpClient,
    base_uri: &str,
    timeout: Duration,
    exchange: &mut Exchange,
) -> Result<(), GatewayError> {
    let body = match exchange.take_body() {
        Body::Stream(stream) => stream,
        other => {
            let kind = other.kind();
            exchange.body = other;
            return Err(GatewayError::UnsupportedMode(kind));
        }
    };

    let target = proxy_target(base_uri, exchange);
    let mut request = Request::builder()
        .method(request_method(exchange))
        .uri(target.as_str())
        .body(body)?;
    *request.headers_mut() = export_headers(exchange, &EXCLUDED_HEADERS);

    debug!("Proxying {} {} (exchange {})", request.method(), target, exchange.id());

    match send_with_timeout(client, request, timeout).await {
        Outcome::Response(response) => {
            let (parts, body) = response.into_parts();
            import_response_headers(exchange, &parts.headers);
            exchange.set_header(STATUS_CODE, parts.status.as_u16().to_string());
            let body = IdleTimeoutBody::new(body.map_err(BoxError::from).boxed(), timeout);
            exchange.body = Body::Stream(body.boxed());
        }
        Outcome::Failed { message, reset } => record_failure(exchange, message, reset),
    }
    Ok(())
}

/// Send the exchange body to `uri` and buffer the upstream reply.
pub(crate) async fn invoke(
    client: &HttpClient,
    uri: &str,
    timeout: Duration,
    exchange: &mut Exchange,
) -> Result<(), GatewayError> {
    let mut builder = Request::builder()
        .method(request_method(exchange))
        .uri(uri);

    let body = match exchange.take_body() {
        Body::Stream(stream) => stream,
        buffered => {
            if buffered.is_json() {
                builder = builder.header(CONTENT_TYPE, "application/json");
            }
            let payload = buffered.to_payload()?.unwrap_or_default();
            builder = builder.header(CONTENT_LENGTH, payload.len());
            full(payload)
        }
    };
    let request = builder.body(body)?;

    debug!("Invoking {} {} (exchange {})", request.method(), uri, exchange.id());

    let deadline = Instant::now() + timeout;
    match send_with_timeout(client, request, timeout).await {
        Outcome::Response(response) => {
            let (parts, body) = response.into_parts();
            import_response_headers(exchange, &parts.headers);
            exchange.set_header(STATUS_CODE, parts.status.as_u16().to_string());
            match tokio::time::timeout_at(deadline, body.collect()).await {
                Ok(Ok(collected)) => exchange.body = Body::from_payload(collected.to_bytes()),
                Ok(Err(e)) => {
                    let reset = is_reset(&e);
                    record_failure(
                        exchange,
                        format!("Failed to read upstream response: {e}"),
                        reset,
                    );
                }
                Err(_) => record_failure(exchange, timed_out(timeout), true),
            }
        }
        Outcome::Failed { message, reset } => record_failure(exchange, message, reset),
    }
    Ok(())
}

/// Run the request on its own task and abort it once the deadline passes.
async fn send_with_timeout(
    client: &HttpClient,
    request: Request<crate::exchange::StreamBody>,
    timeout: Duration,
) -> Outcome {
    let mut call = tokio::spawn(client.request(request));
    tokio::select! {
        joined = &mut call => match joined {
            Ok(Ok(response)) => Outcome::Response(response),
            Ok(Err(e)) => Outcome::Failed {
                reset: is_reset(&e),
                message: describe(&e),
            },
            Err(e) => Outcome::Failed {
                message: format!("Upstream request task failed: {e}"),
                reset: false,
            },
        },
        _ = tokio::time::sleep(timeout) => {
            call.abort();
            Outcome::Failed {
                message: timed_out(timeout),
                reset: true,
            }
        }
    }
}

fn timed_out(timeout: Duration) -> String {
    format!("Upstream timed out after {}ms", timeout.as_millis())
}

fn record_failure(exchange: &mut Exchange, message: String, reset: bool) {
    warn!("Upstream call for exchange {} failed: {}", exchange.id(), message);
    if reset {
        exchange.body = Body::Text(RESET_SENTINEL.to_string());
    }
    exchange.fail(ExchangeError::new(message));
}

fn request_method(exchange: &Exchange) -> Method {
    exchange
        .header(REQUEST_METHOD)
        .and_then(|method| Method::from_bytes(method.as_bytes()).ok())
        .unwrap_or(Method::GET)
}

/// `base + translated-uri`, plus the request's query string when present.
fn proxy_target(base_uri: &str, exchange: &Exchange) -> String {
    let translated = exchange.header(TRANSLATED_URI).unwrap_or_default();
    let mut target = if translated.starts_with('/') {
        format!("{}{}", base_uri.trim_end_matches('/'), translated)
    } else {
        format!("{base_uri}{translated}")
    };
    if let Some(query) = exchange.header(QUERY_STRING).filter(|q| !q.is_empty()) {
        target.push('?');
        target.push_str(query);
    }
    target
}

/// Full error chain, since the client error alone only says "client error".
fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Connection reset or aborted anywhere in the error chain.
fn is_reset(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
            ) {
                return true;
            }
        }
        if let Some(hyper_err) = e.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() || hyper_err.is_canceled() {
                return true;
            }
        }
        current = e.source();
    }
    false
}

//! Tagged exchange body.
//!
//! A body is either buffered in memory or a streaming HTTP body. Code that
//! needs to know which one it holds matches on the variant.

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use std::convert::Infallible;
use std::fmt;

/// Error carried by streaming bodies: hyper's own errors, or an idle
/// timeout raised while waiting on an upstream.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Streaming body type shared by inbound requests, upstream responses and
/// listener responses.
pub type StreamBody = BoxBody<Bytes, BoxError>;

#[derive(Default)]
pub enum Body {
    #[default]
    Empty,
    Text(String),
    Json(serde_json::Value),
    /// Buffered payload that is not valid UTF-8.
    Bytes(Bytes),
    Stream(StreamBody),
}

impl Body {
    /// Build a body from a JSON value: strings stay textual, everything else
    /// is kept as a structured value.
    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => Body::Text(text),
            serde_json::Value::Null => Body::Empty,
            other => Body::Json(other),
        }
    }

    /// Buffered payload as received from an upstream.
    pub fn from_payload(payload: Bytes) -> Self {
        if payload.is_empty() {
            return Body::Empty;
        }
        match String::from_utf8(payload.to_vec()) {
            Ok(text) => Body::Text(text),
            Err(_) => Body::Bytes(payload),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Body::Empty => "empty",
            Body::Text(_) => "text",
            Body::Json(_) => "json",
            Body::Bytes(_) => "bytes",
            Body::Stream(_) => "stream",
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Body::Json(_))
    }

    /// Serialize a buffered body. Returns `None` for streams.
    ///
    /// Text and bytes pass through unchanged; JSON values are encoded once.
    pub fn to_payload(&self) -> Result<Option<Bytes>, serde_json::Error> {
        let payload = match self {
            Body::Empty => Bytes::new(),
            Body::Text(text) => Bytes::from(text.clone()),
            Body::Json(value) => Bytes::from(serde_json::to_vec(value)?),
            Body::Bytes(bytes) => bytes.clone(),
            Body::Stream(_) => return Ok(None),
        };
        Ok(Some(payload))
    }

    /// Convert into an HTTP body, wrapping buffered payloads in `Full`.
    pub fn into_stream(self) -> Result<StreamBody, serde_json::Error> {
        match self {
            Body::Stream(stream) => Ok(stream),
            Body::Empty => Ok(empty()),
            buffered => {
                let payload = buffered.to_payload()?.unwrap_or_default();
                Ok(full(payload))
            }
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Body::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Body::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Body::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Body::from_value(value)
    }
}

/// Box a fully buffered payload.
pub fn full(payload: impl Into<Bytes>) -> StreamBody {
    Full::new(payload.into())
        .map_err(|never: Infallible| match never {})
        .boxed()
}

pub fn empty() -> StreamBody {
    Empty::<Bytes>::new()
        .map_err(|never: Infallible| match never {})
        .boxed()
}

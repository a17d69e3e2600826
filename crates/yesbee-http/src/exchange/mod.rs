//! The exchange: the message envelope carried through the pipeline.
//!
//! An exchange is created by an origin listener for every routed request,
//! moves by value through the dispatcher and its processors, and comes back
//! to the listener on its completion channel.
//!
//! ## Module Structure
//!
//! - `body`: tagged body (buffered payload or stream)
//! - `headers`: the `http::` header namespace and header map conversions

pub mod body;
pub mod headers;

pub use body::{Body, BoxError, StreamBody};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

/// Property naming the completion channel a listener waits on.
pub const CALLBACK_PROPERTY: &str = "callback";

/// Unique exchange identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeId(Uuid);

impl ExchangeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failure descriptor carried on a failed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeError {
    pub message: String,
    pub status_code: Option<u16>,
}

impl ExchangeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
        }
    }

    pub fn with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Status the listener answers with; 500 unless the error declares one.
    pub fn status(&self) -> u16 {
        self.status_code.unwrap_or(500)
    }
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Default)]
pub struct Exchange {
    id: ExchangeId,
    headers: BTreeMap<String, String>,
    pub body: Body,
    pub error: Option<ExchangeError>,
    properties: HashMap<String, String>,
}

impl Exchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> ExchangeId {
        self.id
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(key.into(), value.into());
    }

    pub fn remove_header(&mut self, key: &str) -> Option<String> {
        self.headers.remove(key)
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Record a failure. The exchange keeps flowing; the listener turns the
    /// error into the HTTP response.
    pub fn fail(&mut self, error: ExchangeError) {
        self.error = Some(error);
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Take the body, leaving `Body::Empty` behind.
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }
}

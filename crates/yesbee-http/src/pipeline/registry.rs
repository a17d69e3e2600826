//! Shared service lookup.

use crate::error::GatewayError;
use crate::service::HttpService;
use parking_lot::RwLock;
use std::sync::Arc;

/// Services that components fetch at start/stop time.
#[derive(Default)]
pub struct ServiceRegistry {
    http: RwLock<Option<Arc<HttpService>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_http(&self, service: Arc<HttpService>) {
        *self.http.write() = Some(service);
    }

    pub fn remove_http(&self) -> Option<Arc<HttpService>> {
        self.http.write().take()
    }

    /// The http service, or a configuration error if it is not running.
    pub fn http(&self) -> Result<Arc<HttpService>, GatewayError> {
        self.http
            .read()
            .clone()
            .ok_or(GatewayError::ServiceUnavailable("http"))
    }
}

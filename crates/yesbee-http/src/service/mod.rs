//! The shared http service.
//!
//! Keeps one [`OriginListener`] per origin and creates it on first use, so
//! every source bound to the same host and port shares one socket.
//!
//! ## Module Structure
//!
//! - `origin`: uri to (protocol, host, port) parsing
//! - `routes`: path normalization and prefix route table
//! - `scope`: pending request scopes awaiting completion
//! - `connections`: open client connection tracking
//! - `listener`: the per-origin server

mod connections;
mod listener;
mod origin;
mod routes;
mod scope;

pub use connections::ConnectionSet;
pub use listener::OriginListener;
pub use origin::Origin;
pub use routes::{normalize_path, translated_uri, RouteMatch, RouteTable};
pub use scope::{Scope, ScopeTable};

use crate::component::Processor;
use crate::error::GatewayError;
use crate::pipeline::Dispatcher;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

pub struct HttpService {
    dispatcher: Arc<dyn Dispatcher>,
    // Async mutex: creating a listener awaits the bind.
    listeners: Mutex<HashMap<String, Arc<OriginListener>>>,
}

impl HttpService {
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            dispatcher,
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Listener for the origin of `uri`, created and started on first use.
    pub async fn acquire(&self, uri: &str) -> Result<Arc<OriginListener>, GatewayError> {
        let (origin, _) = Origin::parse(uri)?;
        let id = origin.id();

        let mut listeners = self.listeners.lock().await;
        if let Some(existing) = listeners.get(&id) {
            return Ok(Arc::clone(existing));
        }

        let listener = Arc::new(OriginListener::new(origin, Arc::clone(&self.dispatcher))?);
        listener.start().await?;
        listeners.insert(id, Arc::clone(&listener));
        Ok(listener)
    }

    /// Existing listener for the origin of `uri`, without creating one.
    pub async fn get(&self, uri: &str) -> Result<Option<Arc<OriginListener>>, GatewayError> {
        let (origin, _) = Origin::parse(uri)?;
        Ok(self.listeners.lock().await.get(&origin.id()).cloned())
    }

    /// Route the path of `uri` to `handler` on its origin's listener.
    pub async fn attach(
        &self,
        uri: &str,
        handler: Arc<dyn Processor>,
    ) -> Result<Arc<OriginListener>, GatewayError> {
        let (_, path) = Origin::parse(uri)?;
        let listener = self.acquire(uri).await?;
        listener.route(&path, handler);
        Ok(listener)
    }

    /// Remove the route for `uri` if it is still bound to `handler`.
    pub async fn detach(
        &self,
        uri: &str,
        handler: &Arc<dyn Processor>,
    ) -> Result<bool, GatewayError> {
        let (_, path) = Origin::parse(uri)?;
        Ok(match self.get(uri).await? {
            Some(listener) => listener.deroute(&path, handler),
            None => false,
        })
    }

    /// Close and forget the listener for the origin of `uri`.
    pub async fn close(&self, uri: &str, force: bool) -> Result<bool, GatewayError> {
        let (origin, _) = Origin::parse(uri)?;
        let removed = self.listeners.lock().await.remove(&origin.id());
        match removed {
            Some(listener) => {
                listener.close(force).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn close_all(&self, force: bool) {
        let listeners: Vec<Arc<OriginListener>> = self
            .listeners
            .lock()
            .await
            .drain()
            .map(|(_, listener)| listener)
            .collect();
        let count = listeners.len();
        futures::future::join_all(listeners.iter().map(|l| l.close(force))).await;
        if count > 0 {
            info!("Closed {} listener(s)", count);
        }
    }

    pub async fn listeners(&self) -> Vec<Arc<OriginListener>> {
        self.listeners.lock().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::StaticResponder;
    use crate::pipeline::LocalDispatcher;

    fn service() -> HttpService {
        HttpService::new(Arc::new(LocalDispatcher::new()))
    }

    fn handler(name: &str) -> Arc<dyn Processor> {
        Arc::new(StaticResponder::new(name, "ok".into(), 0))
    }

    #[tokio::test]
    async fn test_acquire_reuses_listener_per_origin() {
        let service = service();
        let a = service.acquire("http://127.0.0.1:0/a").await.unwrap();
        let b = service.acquire("http://127.0.0.1:0/b").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.local_addr().is_some());
        assert_eq!(service.listeners().await.len(), 1);
        service.close_all(false).await;
        assert!(service.listeners().await.is_empty());
    }

    #[tokio::test]
    async fn test_acquire_rejects_other_protocols() {
        let service = service();
        let err = service.acquire("https://127.0.0.1:0/").await.unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedProtocol(_)));
        assert!(service.listeners().await.is_empty());
    }

    #[tokio::test]
    async fn test_attach_detach() {
        let service = service();
        let h = handler("h");
        let listener = service
            .attach("http://127.0.0.1:0/items/", Arc::clone(&h))
            .await
            .unwrap();
        assert_eq!(listener.routes(), vec!["/items".to_string()]);

        assert!(!service
            .detach("http://127.0.0.1:0/items", &handler("other"))
            .await
            .unwrap());
        assert!(service.detach("http://127.0.0.1:0/items", &h).await.unwrap());
        assert!(listener.routes().is_empty());
        service.close_all(true).await;
    }

    #[tokio::test]
    async fn test_detach_unknown_origin_is_noop() {
        let service = service();
        assert!(!service
            .detach("http://127.0.0.1:1/x", &handler("h"))
            .await
            .unwrap());
        assert!(service.listeners().await.is_empty());
    }

    #[tokio::test]
    async fn test_close_unknown_origin() {
        let service = service();
        assert!(!service.close("http://127.0.0.1:0", false).await.unwrap());
    }
}

//! Pending request scopes.
//!
//! A scope pairs an in-flight request with the channel its response is
//! written to. It is opened when the exchange is dispatched and taken exactly
//! once when the exchange completes.

use crate::exchange::{ExchangeId, StreamBody};
use hyper::http::request::Parts;
use hyper::Response;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::oneshot;

pub struct Scope {
    pub request: Parts,
    pub responder: oneshot::Sender<Response<StreamBody>>,
    pub opened_at: Instant,
}

impl Scope {
    pub fn new(request: Parts, responder: oneshot::Sender<Response<StreamBody>>) -> Self {
        Self {
            request,
            responder,
            opened_at: Instant::now(),
        }
    }
}

#[derive(Default)]
pub struct ScopeTable {
    scopes: Mutex<HashMap<ExchangeId, Scope>>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: ExchangeId, scope: Scope) {
        self.scopes.lock().insert(id, scope);
    }

    /// Remove and return the scope. A second call for the same id gets `None`.
    pub fn take(&self, id: ExchangeId) -> Option<Scope> {
        self.scopes.lock().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.scopes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.lock().is_empty()
    }
}

/// Removes an abandoned scope when the request future is dropped before
/// its exchange completes.
pub(crate) struct PendingScope<'a> {
    pub(crate) table: &'a ScopeTable,
    pub(crate) id: ExchangeId,
}

impl Drop for PendingScope<'_> {
    fn drop(&mut self) {
        self.table.take(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Request;

    fn parts() -> Parts {
        Request::builder()
            .uri("/echo")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn test_take_once() {
        let table = ScopeTable::new();
        let id = ExchangeId::new();
        let (tx, _rx) = oneshot::channel();
        table.insert(id, Scope::new(parts(), tx));
        assert_eq!(table.len(), 1);

        let scope = table.take(id).unwrap();
        assert_eq!(scope.request.uri.path(), "/echo");
        assert!(table.take(id).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_pending_scope_cleans_up() {
        let table = ScopeTable::new();
        let id = ExchangeId::new();
        let (tx, _rx) = oneshot::channel();
        table.insert(id, Scope::new(parts(), tx));
        {
            let _pending = PendingScope { table: &table, id };
        }
        assert!(table.is_empty());
    }
}

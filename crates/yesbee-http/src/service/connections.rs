//! Tracking of open client connections for a listener.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::AbortHandle;

/// Set of connection tasks. Each task removes itself when it ends, however
/// it ends, so the set only ever holds live connections.
#[derive(Clone, Default)]
pub struct ConnectionSet {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    // `None` while the task is being spawned.
    open: Mutex<HashMap<u64, Option<AbortHandle>>>,
    idle: Notify,
}

struct ConnectionGuard {
    inner: Arc<Inner>,
    id: u64,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let mut open = self.inner.open.lock();
        open.remove(&self.id);
        if open.is_empty() {
            self.inner.idle.notify_waiters();
        }
    }
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a connection task and track it until it finishes.
    pub fn spawn<F>(&self, connection: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.open.lock().insert(id, None);

        let guard = ConnectionGuard {
            inner: Arc::clone(&self.inner),
            id,
        };
        let handle = tokio::spawn(async move {
            let _guard = guard;
            connection.await;
        });

        if let Some(slot) = self.inner.open.lock().get_mut(&id) {
            *slot = Some(handle.abort_handle());
        }
    }

    pub fn len(&self) -> usize {
        self.inner.open.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.open.lock().is_empty()
    }

    /// Abort every tracked connection. Returns how many were aborted.
    pub fn abort_all(&self) -> usize {
        let handles: Vec<AbortHandle> = self
            .inner
            .open
            .lock()
            .values()
            .flatten()
            .cloned()
            .collect();
        for handle in &handles {
            handle.abort();
        }
        handles.len()
    }

    /// Wait until no connection is left.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Forget every tracked connection without touching the tasks.
    pub fn clear(&self) {
        self.inner.open.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_finished_connections_remove_themselves() {
        let set = ConnectionSet::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        set.spawn(async move {
            let _ = rx.await;
        });
        assert_eq!(set.len(), 1);

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), set.wait_idle())
            .await
            .unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_abort_all() {
        let set = ConnectionSet::new();
        for _ in 0..3 {
            set.spawn(std::future::pending());
        }
        assert_eq!(set.len(), 3);
        assert_eq!(set.abort_all(), 3);
        tokio::time::timeout(Duration::from_secs(1), set.wait_idle())
            .await
            .unwrap();
        assert_eq!(set.len(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_on_empty_set_returns() {
        let set = ConnectionSet::new();
        set.wait_idle().await;
        set.clear();
        assert!(set.is_empty());
    }
}

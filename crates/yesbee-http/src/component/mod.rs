//! Pipeline components.
//!
//! Every component is a [`Processor`] (it can act on an exchange) and has a
//! [`Lifecycle`]. Shared start/stop behavior lives in [`BaseComponent`],
//! which concrete components embed and expose through [`Lifecycle::base`].
//!
//! - `http`: the HTTP source/sink component
//! - `forward`: outbound proxy and generic invocation
//! - `client`: pooled hyper client construction
//! - `idle`: idle deadline for streamed upstream bodies
//! - `respond`: static responder used to terminate flows

mod client;
mod forward;
mod http;
mod idle;
mod respond;

pub use client::{create_http_client, HttpClient};
pub use forward::RESET_SENTINEL;
pub use http::{HttpComponent, HttpOptions, Role};
pub use respond::StaticResponder;

use crate::error::GatewayError;
use crate::exchange::Exchange;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[async_trait]
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;

    async fn process(&self, exchange: &mut Exchange) -> Result<(), GatewayError>;
}

/// True when both handles point at the same processor instance.
pub fn same_processor(a: &Arc<dyn Processor>, b: &Arc<dyn Processor>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Start/stop hooks. The defaults only flip the running flag of the
/// embedded [`BaseComponent`].
#[async_trait]
pub trait Lifecycle: Send + Sync {
    fn base(&self) -> &BaseComponent;

    async fn start(self: Arc<Self>) -> Result<(), GatewayError> {
        self.base().mark_started();
        Ok(())
    }

    async fn stop(self: Arc<Self>) -> Result<(), GatewayError> {
        self.base().mark_stopped();
        Ok(())
    }
}

#[derive(Debug)]
pub struct BaseComponent {
    name: String,
    running: AtomicBool,
}

impl BaseComponent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            running: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn mark_started(&self) {
        if !self.running.swap(true, Ordering::AcqRel) {
            info!("Component '{}' started", self.name);
        }
    }

    pub fn mark_stopped(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            info!("Component '{}' stopped", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_component_flags() {
        let base = BaseComponent::new("echo");
        assert_eq!(base.name(), "echo");
        assert!(!base.is_running());
        base.mark_started();
        base.mark_started();
        assert!(base.is_running());
        base.mark_stopped();
        assert!(!base.is_running());
    }

    #[tokio::test]
    async fn test_default_lifecycle_and_identity() {
        let responder = Arc::new(StaticResponder::new("echo", "hi".into(), 0));
        Arc::clone(&responder).start().await.unwrap();
        assert!(responder.base().is_running());
        Arc::clone(&responder).stop().await.unwrap();
        assert!(!responder.base().is_running());

        let a: Arc<dyn Processor> = responder.clone();
        let b: Arc<dyn Processor> = responder;
        let other: Arc<dyn Processor> = Arc::new(StaticResponder::new("echo", "hi".into(), 0));
        assert!(same_processor(&a, &b));
        assert!(!same_processor(&a, &other));
    }
}

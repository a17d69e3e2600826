//! Static responder.

use super::{BaseComponent, Lifecycle, Processor};
use crate::error::GatewayError;
use crate::exchange::{Body, Exchange};
use async_trait::async_trait;
use std::time::Duration;

/// Replaces the exchange body with a fixed value, optionally after a delay.
pub struct StaticResponder {
    base: BaseComponent,
    body: serde_json::Value,
    delay: Duration,
}

impl StaticResponder {
    pub fn new(name: impl Into<String>, body: serde_json::Value, delay_ms: u64) -> Self {
        Self {
            base: BaseComponent::new(name),
            body,
            delay: Duration::from_millis(delay_ms),
        }
    }
}

#[async_trait]
impl Processor for StaticResponder {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn process(&self, exchange: &mut Exchange) -> Result<(), GatewayError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        exchange.body = Body::from_value(self.body.clone());
        Ok(())
    }
}

impl Lifecycle for StaticResponder {
    fn base(&self) -> &BaseComponent {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_sets_text_and_json_bodies() {
        let mut exchange = Exchange::new();
        StaticResponder::new("text", json!("Hello world!"), 0)
            .process(&mut exchange)
            .await
            .unwrap();
        assert!(matches!(&exchange.body, Body::Text(text) if text == "Hello world!"));

        StaticResponder::new("json", json!({"ok": true}), 0)
            .process(&mut exchange)
            .await
            .unwrap();
        assert!(matches!(&exchange.body, Body::Json(value) if value["ok"] == true));
    }

    #[tokio::test]
    async fn test_delay_is_honored() {
        let responder = StaticResponder::new("slow", json!("late"), 50);
        let started = std::time::Instant::now();
        let mut exchange = Exchange::new();
        responder.process(&mut exchange).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}

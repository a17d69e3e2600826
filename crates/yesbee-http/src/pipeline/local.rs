//! In-process dispatcher.
//!
//! A flow is the ordered list of processors that follow a source. Sending
//! an exchange `In` spawns a task that runs the handler and then the flow
//! registered under the handler's name; the result goes to the channel named
//! by the exchange's `callback` property.

use super::{Direction, Dispatcher};
use crate::component::Processor;
use crate::exchange::{Exchange, ExchangeError, CALLBACK_PROPERTY};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

#[derive(Clone, Default)]
pub struct LocalDispatcher {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    flows: RwLock<HashMap<String, Vec<Arc<dyn Processor>>>>,
    channels: RwLock<HashMap<String, mpsc::UnboundedSender<Exchange>>>,
}

impl LocalDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the processors that run after `source`.
    pub fn set_flow(&self, source: &str, steps: Vec<Arc<dyn Processor>>) {
        debug!("Flow '{}' has {} step(s)", source, steps.len());
        self.inner.flows.write().insert(source.to_string(), steps);
    }

    pub fn remove_flow(&self, source: &str) -> bool {
        self.inner.flows.write().remove(source).is_some()
    }

    /// Number of subscribed completion channels.
    pub fn channel_count(&self) -> usize {
        self.inner.channels.read().len()
    }
}

impl Dispatcher for LocalDispatcher {
    fn send(
        &self,
        direction: Direction,
        handler: Arc<dyn Processor>,
        exchange: Exchange,
        source: &str,
    ) {
        debug!(
            "Dispatching exchange {} {} to '{}' from {}",
            exchange.id(),
            direction.as_str(),
            handler.name(),
            source
        );
        match direction {
            Direction::In => {
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    let exchange = inner.run(handler, exchange).await;
                    inner.deliver(exchange);
                });
            }
            Direction::Out => self.inner.deliver(exchange),
        }
    }

    fn subscribe(&self, channel: &str) -> mpsc::UnboundedReceiver<Exchange> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self
            .inner
            .channels
            .write()
            .insert(channel.to_string(), tx)
            .is_some()
        {
            warn!("Completion channel {} re-subscribed", channel);
        }
        rx
    }

    fn unsubscribe(&self, channel: &str) {
        self.inner.channels.write().remove(channel);
    }
}

impl Inner {
    /// Run the handler and its flow. Stops at the first failure; a processor
    /// error is recorded on the exchange so it still completes.
    async fn run(&self, handler: Arc<dyn Processor>, mut exchange: Exchange) -> Exchange {
        let flow: Vec<Arc<dyn Processor>> = self
            .flows
            .read()
            .get(handler.name())
            .cloned()
            .unwrap_or_default();

        for step in std::iter::once(handler).chain(flow) {
            if exchange.is_failed() {
                break;
            }
            if let Err(e) = step.process(&mut exchange).await {
                error!(
                    "Processor '{}' failed on exchange {}: {}",
                    step.name(),
                    exchange.id(),
                    e
                );
                exchange.fail(ExchangeError::new(e.to_string()));
            }
        }
        exchange
    }

    fn deliver(&self, exchange: Exchange) {
        let Some(channel) = exchange.property(CALLBACK_PROPERTY).map(str::to_owned) else {
            debug!("Exchange {} has no completion channel", exchange.id());
            return;
        };
        let sender = self.channels.read().get(&channel).cloned();
        match sender {
            Some(tx) => {
                if let Err(returned) = tx.send(exchange) {
                    warn!(
                        "Completion channel {} closed, dropping exchange {}",
                        channel,
                        returned.0.id()
                    );
                }
            }
            None => warn!(
                "No subscriber on {}, dropping exchange {}",
                channel,
                exchange.id()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{BaseComponent, Lifecycle};
    use crate::error::GatewayError;
    use crate::exchange::Body;
    use async_trait::async_trait;

    struct Append {
        base: BaseComponent,
        suffix: &'static str,
    }

    #[async_trait]
    impl Processor for Append {
        fn name(&self) -> &str {
            self.base.name()
        }

        async fn process(&self, exchange: &mut Exchange) -> Result<(), GatewayError> {
            let current = match &exchange.body {
                Body::Text(text) => text.clone(),
                _ => String::new(),
            };
            exchange.body = Body::Text(format!("{current}{}", self.suffix));
            Ok(())
        }
    }

    impl Lifecycle for Append {
        fn base(&self) -> &BaseComponent {
            &self.base
        }
    }

    struct Reject;

    #[async_trait]
    impl Processor for Reject {
        fn name(&self) -> &str {
            "reject"
        }

        async fn process(&self, exchange: &mut Exchange) -> Result<(), GatewayError> {
            Err(GatewayError::UnsupportedMode(exchange.body.kind()))
        }
    }

    fn append(name: &str, suffix: &'static str) -> Arc<dyn Processor> {
        Arc::new(Append {
            base: BaseComponent::new(name),
            suffix,
        })
    }

    #[tokio::test]
    async fn test_runs_handler_then_flow_and_completes() {
        let dispatcher = LocalDispatcher::new();
        let mut completions = dispatcher.subscribe("listener#out");
        dispatcher.set_flow("source", vec![append("b", "b"), append("c", "c")]);

        let mut exchange = Exchange::new();
        exchange.set_property(CALLBACK_PROPERTY, "listener#out");
        let id = exchange.id();

        dispatcher.send(Direction::In, append("source", "a"), exchange, "test");

        let done = completions.recv().await.unwrap();
        assert_eq!(done.id(), id);
        assert!(matches!(&done.body, Body::Text(text) if text == "abc"));
    }

    #[tokio::test]
    async fn test_processor_error_is_recorded_and_flow_stops() {
        let dispatcher = LocalDispatcher::new();
        let mut completions = dispatcher.subscribe("l#out");
        dispatcher.set_flow("reject", vec![append("after", "!")]);

        let mut exchange = Exchange::new();
        exchange.set_property(CALLBACK_PROPERTY, "l#out");
        dispatcher.send(Direction::In, Arc::new(Reject), exchange, "test");

        let done = completions.recv().await.unwrap();
        let error = done.error.as_ref().unwrap();
        assert_eq!(error.status(), 500);
        assert!(error.message.contains("Proxy mode"));
        assert_eq!(done.body.kind(), "empty");
    }

    #[tokio::test]
    async fn test_out_delivers_directly() {
        let dispatcher = LocalDispatcher::new();
        let mut completions = dispatcher.subscribe("l#out");

        let mut exchange = Exchange::new();
        exchange.set_property(CALLBACK_PROPERTY, "l#out");
        dispatcher.send(Direction::Out, append("unused", "x"), exchange, "test");

        let done = completions.recv().await.unwrap();
        assert_eq!(done.body.kind(), "empty");
    }

    #[tokio::test]
    async fn test_unsubscribe_drops_channel() {
        let dispatcher = LocalDispatcher::new();
        let mut completions = dispatcher.subscribe("l#out");
        assert_eq!(dispatcher.channel_count(), 1);
        dispatcher.unsubscribe("l#out");
        assert_eq!(dispatcher.channel_count(), 0);
        assert!(completions.recv().await.is_none());
    }
}

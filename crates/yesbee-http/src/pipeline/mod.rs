//! The pipeline boundary.
//!
//! The HTTP layer does not run flows itself. It hands exchanges to a
//! [`Dispatcher`] with a one-way `send` and later receives the completed
//! exchange on a per-listener completion channel.
//!
//! - `local`: in-process dispatcher that runs a flow of processors
//! - `registry`: lookup of shared services (the http service)

mod local;
mod registry;

pub use local::LocalDispatcher;
pub use registry::ServiceRegistry;

use crate::component::Processor;
use crate::exchange::Exchange;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Direction of a dispatched exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Into a flow: run the handler and its downstream processors.
    In,
    /// Back to whoever waits for the exchange on its completion channel.
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

/// One-way dispatch plus completion channels.
pub trait Dispatcher: Send + Sync {
    /// Fire-and-forget delivery of `exchange` to `handler`.
    fn send(
        &self,
        direction: Direction,
        handler: Arc<dyn Processor>,
        exchange: Exchange,
        source: &str,
    );

    /// Name of the channel `owner` listens on for the given direction.
    fn channel_id(&self, direction: Direction, owner: &str) -> String {
        format!("{owner}#{}", direction.as_str())
    }

    /// Register a completion channel. A second subscription to the same id
    /// replaces the first.
    fn subscribe(&self, channel: &str) -> mpsc::UnboundedReceiver<Exchange>;

    fn unsubscribe(&self, channel: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_format() {
        let dispatcher = LocalDispatcher::new();
        assert_eq!(
            dispatcher.channel_id(Direction::Out, "http://127.0.0.1:3000"),
            "http://127.0.0.1:3000#out"
        );
        assert_eq!(dispatcher.channel_id(Direction::In, "a"), "a#in");
    }
}

//! HTTP gateway for the yesbee integration pipeline.
//!
//! Origin listeners accept HTTP requests, route them by path prefix and hand
//! them to the pipeline as exchanges. Sink components call upstreams, either
//! as a streaming reverse proxy or as a buffered invoker.

pub mod component;
pub mod config;
pub mod error;
pub mod exchange;
pub mod gateway;
pub mod pipeline;
pub mod response;
pub mod service;

pub use config::Config;
pub use error::GatewayError;
pub use exchange::{Body, Exchange, ExchangeError};
pub use gateway::Gateway;

//! The HTTP component.
//!
//! As a source it registers itself as the route handler for its uri on the
//! shared http service. As a sink it calls an upstream, either proxying the
//! inbound stream or invoking the uri with the exchange body.

use super::client::{create_http_client, HttpClient};
use super::{forward, BaseComponent, Lifecycle, Processor};
use crate::config::ClientConfig;
use crate::error::GatewayError;
use crate::exchange::Exchange;
use crate::pipeline::ServiceRegistry;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub proxy: bool,
    pub timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            proxy: false,
            timeout: Duration::from_secs(30),
        }
    }
}

pub enum Role {
    /// Receives requests from an origin listener.
    Source,
    /// Sends exchanges to an upstream.
    Sink {
        options: HttpOptions,
        client: HttpClient,
    },
}

pub struct HttpComponent {
    base: BaseComponent,
    uri: String,
    role: Role,
    services: Arc<ServiceRegistry>,
}

impl HttpComponent {
    pub fn source(
        name: impl Into<String>,
        uri: impl Into<String>,
        services: Arc<ServiceRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            base: BaseComponent::new(name),
            uri: uri.into(),
            role: Role::Source,
            services,
        })
    }

    pub fn sink(
        name: impl Into<String>,
        uri: impl Into<String>,
        options: HttpOptions,
        client_config: &ClientConfig,
        services: Arc<ServiceRegistry>,
    ) -> Arc<Self> {
        let client = create_http_client(client_config, Some(options.timeout));
        Arc::new(Self {
            base: BaseComponent::new(name),
            uri: uri.into(),
            role: Role::Sink { options, client },
            services,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn is_source(&self) -> bool {
        matches!(self.role, Role::Source)
    }
}

#[async_trait]
impl Processor for HttpComponent {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn process(&self, exchange: &mut Exchange) -> Result<(), GatewayError> {
        match &self.role {
            Role::Source => Ok(()),
            Role::Sink { options, client } if options.proxy => {
                forward::proxy(client, &self.uri, options.timeout, exchange).await
            }
            Role::Sink { options, client } => {
                forward::invoke(client, &self.uri, options.timeout, exchange).await
            }
        }
    }
}

#[async_trait]
impl Lifecycle for HttpComponent {
    fn base(&self) -> &BaseComponent {
        &self.base
    }

    async fn start(self: Arc<Self>) -> Result<(), GatewayError> {
        if self.is_source() {
            let service = self.services.http()?;
            let handler: Arc<dyn Processor> = self.clone();
            service.attach(&self.uri, handler).await?;
            info!("Source '{}' attached to {}", self.base.name(), self.uri);
        }
        self.base.mark_started();
        Ok(())
    }

    async fn stop(self: Arc<Self>) -> Result<(), GatewayError> {
        if self.is_source() {
            let service = self.services.http()?;
            let handler: Arc<dyn Processor> = self.clone();
            if service.detach(&self.uri, &handler).await? {
                info!("Source '{}' detached from {}", self.base.name(), self.uri);
            }
        }
        self.base.mark_stopped();
        Ok(())
    }
}

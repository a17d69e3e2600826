//! Gateway assembly: turns a [`Config`] into running components.

use crate::component::{HttpComponent, HttpOptions, Lifecycle, Processor, StaticResponder};
use crate::config::{Config, StepConfig};
use crate::error::GatewayError;
use crate::pipeline::{Dispatcher, LocalDispatcher, ServiceRegistry};
use crate::service::HttpService;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct Gateway {
    dispatcher: LocalDispatcher,
    services: Arc<ServiceRegistry>,
    http: Arc<HttpService>,
    sources: Vec<Arc<HttpComponent>>,
    steps: Vec<Arc<dyn Lifecycle>>,
}

impl Gateway {
    /// Build the dispatcher, the http service and one source plus its steps
    /// per configured route. Nothing is bound until [`Gateway::start`].
    pub fn new(config: &Config) -> Self {
        let dispatcher = LocalDispatcher::new();
        let services = Arc::new(ServiceRegistry::new());
        let shared: Arc<dyn Dispatcher> = Arc::new(dispatcher.clone());
        let http = Arc::new(HttpService::new(shared));
        services.register_http(Arc::clone(&http));

        let mut sources = Vec::new();
        let mut steps: Vec<Arc<dyn Lifecycle>> = Vec::new();

        for route in &config.routes {
            let mut flow: Vec<Arc<dyn Processor>> = Vec::new();
            for (index, step) in route.steps.iter().enumerate() {
                let name = format!("{}/{}-{}", route.name, step.kind(), index);
                match step {
                    StepConfig::Respond { respond } => {
                        let responder = Arc::new(StaticResponder::new(
                            name,
                            respond.body.clone(),
                            respond.delay_ms,
                        ));
                        flow.push(responder.clone());
                        steps.push(responder);
                    }
                    StepConfig::Http { http: step } => {
                        let sink = HttpComponent::sink(
                            name,
                            step.uri.clone(),
                            HttpOptions {
                                proxy: step.proxy,
                                timeout: Duration::from_millis(step.timeout_ms),
                            },
                            &config.client,
                            Arc::clone(&services),
                        );
                        flow.push(sink.clone());
                        steps.push(sink);
                    }
                }
            }
            if flow.is_empty() {
                warn!("Route '{}' has no steps; requests complete with an empty body", route.name);
            }
            dispatcher.set_flow(&route.name, flow);
            sources.push(HttpComponent::source(
                route.name.clone(),
                route.from.clone(),
                Arc::clone(&services),
            ));
        }

        Self {
            dispatcher,
            services,
            http,
            sources,
            steps,
        }
    }

    pub fn http(&self) -> &Arc<HttpService> {
        &self.http
    }

    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    /// Start the steps first so a source never routes into a stopped flow.
    pub async fn start(&self) -> Result<(), GatewayError> {
        for step in &self.steps {
            Arc::clone(step).start().await?;
        }
        for source in &self.sources {
            Arc::clone(source).start().await?;
        }
        info!("Gateway started with {} route(s)", self.sources.len());
        Ok(())
    }

    /// Detach every source, stop the steps and close all listeners.
    pub async fn shutdown(&self, force: bool) {
        for source in &self.sources {
            if let Err(e) = Arc::clone(source).stop().await {
                warn!("Failed to stop source '{}': {}", source.name(), e);
            }
            self.dispatcher.remove_flow(source.name());
        }
        for step in &self.steps {
            if let Err(e) = Arc::clone(step).stop().await {
                warn!("Failed to stop step '{}': {}", step.base().name(), e);
            }
        }
        self.http.close_all(force).await;
        info!("Gateway stopped");
    }
}

//! Configuration types for the gateway.

mod client;
mod route;

use std::collections::HashSet;
use std::path::Path;

use hyper::Uri;
use serde::{Deserialize, Serialize};

use crate::service::Origin;

pub use client::ClientConfig;
pub use route::{HttpStepConfig, RespondConfig, RouteConfig, StepConfig};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,

    pub routes: Vec<RouteConfig>,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, anyhow::Error> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.routes.is_empty() {
            anyhow::bail!("At least one route must be configured");
        }

        let mut names = HashSet::new();
        for route in &self.routes {
            if route.name.trim().is_empty() {
                anyhow::bail!("Route names must not be empty (from: '{}')", route.from);
            }
            if !names.insert(route.name.as_str()) {
                anyhow::bail!("Duplicate route name: '{}'", route.name);
            }

            let (origin, _) = Origin::parse(&route.from)
                .map_err(|e| anyhow::anyhow!("Route '{}': {}", route.name, e))?;
            if origin.protocol != "http" {
                anyhow::bail!(
                    "Route '{}': unsupported protocol '{}'. Currently supported: http",
                    route.name,
                    origin.protocol
                );
            }

            for step in &route.steps {
                if let StepConfig::Http { http } = step {
                    validate_http_step(&route.name, http)?;
                }
            }
        }

        if self.client.connect_timeout_secs == 0 {
            anyhow::bail!("client.connect_timeout_secs must be greater than 0");
        }

        Ok(())
    }
}

fn validate_http_step(route: &str, step: &HttpStepConfig) -> Result<(), anyhow::Error> {
    let uri: Uri = step
        .uri
        .parse()
        .map_err(|e| anyhow::anyhow!("Route '{}': invalid http uri '{}': {}", route, step.uri, e))?;
    if uri.scheme_str() != Some("http") || uri.authority().is_none() {
        anyhow::bail!(
            "Route '{}': http step uri '{}' must be an absolute http:// uri",
            route,
            step.uri
        );
    }
    if step.timeout_ms == 0 {
        anyhow::bail!("Route '{}': timeout_ms must be greater than 0", route);
    }
    Ok(())
}

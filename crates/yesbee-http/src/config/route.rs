use serde::{Deserialize, Serialize};

/// A route: an http source followed by its steps.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Name of the source component; the flow is registered under it.
    pub name: String,
    /// Uri the source listens on, e.g. `http://127.0.0.1:3000/echo`.
    pub from: String,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// One step of a flow, written as a single-key map:
///
/// ```yaml
/// - respond: { body: "Hello world!" }
/// - http: { uri: "http://127.0.0.1:9000", proxy: true }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StepConfig {
    Respond { respond: RespondConfig },
    Http { http: HttpStepConfig },
}

impl StepConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            StepConfig::Respond { .. } => "respond",
            StepConfig::Http { .. } => "http",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RespondConfig {
    /// Strings are sent as text, any other value as JSON.
    #[serde(default)]
    pub body: serde_json::Value,

    #[serde(default)]
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpStepConfig {
    pub uri: String,

    /// Stream the inbound request to `uri + translated path` instead of
    /// sending the exchange body to `uri`.
    #[serde(default)]
    pub proxy: bool,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    30_000
}

use serde::{Deserialize, Serialize};

/// Main Iris configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IrisConfig {
    /// Listener settings
    #[serde(default)]
    pub server: ServerSettings,

    /// OpenAI-compatible backend
    #[serde(default)]
    pub backend: BackendSettings,

    /// Client model id -> backend model id mappings
    #[serde(default)]
    pub models: ModelSettings,

    /// Provider routing per model tier
    #[serde(default)]
    pub routing: RoutingSettings,

    /// Streaming limits
    #[serde(default)]
    pub streaming: StreamingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Upstream request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL; `/v1/chat/completions` is appended
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sent as `Authorization: Bearer <api_key>` when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
        }
    }
}

/// Backend model ids for each Claude tier.
///
/// Tiers left unset fall back to `default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_model")]
    pub default: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opus: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sonnet: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub haiku: Option<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            default: default_model(),
            opus: None,
            sonnet: None,
            haiku: None,
        }
    }
}

/// Per-tier provider routing. A tier without its own policy uses `default`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<RoutingPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opus: Option<RoutingPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sonnet: Option<RoutingPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub haiku: Option<RoutingPolicy>,
}

/// Ordered provider preference forwarded to the backend as `provider`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingPolicy {
    #[serde(default)]
    pub order: Vec<String>,

    #[serde(default = "default_allow_fallbacks")]
    pub allow_fallbacks: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingSettings {
    /// Ceiling in bytes for a buffered Kimi tool-call section
    #[serde(default = "default_kimi_buffer_limit")]
    pub kimi_buffer_limit: usize,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            kimi_buffer_limit: default_kimi_buffer_limit(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_base_url() -> String {
    "https://openrouter.ai/api".to_string()
}

fn default_model() -> String {
    "openai/gpt-4.1".to_string()
}

fn default_allow_fallbacks() -> bool {
    true
}

fn default_kimi_buffer_limit() -> usize {
    10 * 1024
}

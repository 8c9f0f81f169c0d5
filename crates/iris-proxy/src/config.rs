//! Runtime configuration for the proxy.
//!
//! Settings come from an `iris.yml` / `iris.json` / `iris.jsonc` file (see
//! `iris-config`) and are then overridden by environment variables:
//!
//! - `PORT`: server port (default: 8787)
//! - `IRIS_BACKEND_URL`: backend base URL (default: https://openrouter.ai/api)
//! - `IRIS_API_KEY`: bearer token sent to the backend
//! - `REQUEST_TIMEOUT_SECS`: upstream request timeout (default: 120)

use anyhow::{Context, Result};
use iris_config::{IrisConfig, ModelSettings, RoutingSettings};
use std::env;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub backend_url: String,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub models: ModelSettings,
    pub routing: RoutingSettings,
    pub kimi_buffer_limit: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::from_settings(IrisConfig::default())
    }
}

impl ProxyConfig {
    pub fn from_settings(settings: IrisConfig) -> Self {
        Self {
            host: settings.server.host,
            port: settings.server.port,
            backend_url: settings.backend.base_url,
            api_key: settings.backend.api_key,
            request_timeout_secs: settings.server.request_timeout_secs,
            models: settings.models,
            routing: settings.routing,
            kimi_buffer_limit: settings.streaming.kimi_buffer_limit,
        }
    }

    /// Load the config file (explicit path or discovered) and apply
    /// environment overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let settings = iris_config::load_config(config_path)
            .context("Failed to load iris configuration")?;
        let mut config = Self::from_settings(settings);
        config.apply_env_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Override settings from `lookup` (normally the process environment).
    /// Values that fail to parse are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        if let Some(url) = lookup("IRIS_BACKEND_URL").filter(|u| !u.is_empty()) {
            self.backend_url = url;
        }
        if let Some(key) = lookup("IRIS_API_KEY").filter(|k| !k.is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(secs) = lookup("REQUEST_TIMEOUT_SECS").and_then(|p| p.parse().ok()) {
            self.request_timeout_secs = secs;
        }
    }

    pub fn backend_url_trimmed(&self) -> String {
        self.backend_url.trim_end_matches('/').to_string()
    }

    /// Full URL of the backend chat completions endpoint.
    pub fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.backend_url_trimmed())
    }
}

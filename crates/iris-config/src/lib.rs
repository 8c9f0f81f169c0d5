//! Configuration loading for the Iris proxy
//!
//! This crate provides configuration management for Iris, supporting:
//! - YAML, JSON and JSONC configuration files
//! - Environment variable expansion in URLs, keys and model ids
//! - Sensible defaults for every setting

pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_file, ConfigFormat, ResolvedConfig};
pub use schema::{
    BackendSettings, IrisConfig, ModelSettings, RoutingPolicy, RoutingSettings, ServerSettings,
    StreamingSettings,
};

//! Iris Proxy - lets Anthropic Messages clients drive OpenAI-compatible backends.
//!
//! Clients such as Claude Code speak Anthropic's `/v1/messages` API. This
//! crate exposes a compatible HTTP surface and translates requests and
//! responses to the `chat/completions` format understood by OpenRouter and
//! similar backends.
//!
//! Beyond the plain format mapping it:
//! - routes `haiku`/`sonnet`/`opus` model names to configured backend models
//! - repairs tool call / tool result pairing that backends would reject
//! - understands backend dialects that report tool calls differently
//!   (legacy `function_call`, Kimi sentinel tokens inside the text)
//! - translates SSE streams chunk by chunk

pub mod config;
pub mod error;
pub mod format;
pub mod kimi;
pub mod openai;
pub mod qwen;
pub mod resolve;
pub mod schema;
pub mod server;
pub mod sse;
pub mod streaming;
pub mod translation;
pub mod types;
pub mod validation;

pub use config::ProxyConfig;
pub use error::TranslateError;
pub use format::ModelFormat;
pub use server::serve;

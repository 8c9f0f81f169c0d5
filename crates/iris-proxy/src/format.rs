//! Tool-calling dialect detection.

use std::fmt;

/// How a backend model encodes tool calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFormat {
    /// OpenAI `tool_calls` array.
    Standard,
    /// OpenAI-style tool calls, plus `reasoning_content` deltas.
    DeepSeek,
    /// `tool_calls` array or the legacy single `function_call` object.
    Qwen,
    /// Sentinel-delimited tool calls inside the text content.
    Kimi,
}

impl ModelFormat {
    /// Classify a resolved model id. Precedence is Kimi > Qwen > DeepSeek.
    pub fn detect(model_id: &str) -> Self {
        let id = model_id.to_lowercase();
        if id.contains("kimi") || id.contains("k2") {
            ModelFormat::Kimi
        } else if id.contains("qwen") {
            ModelFormat::Qwen
        } else if id.contains("deepseek") {
            ModelFormat::DeepSeek
        } else {
            ModelFormat::Standard
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFormat::Standard => "standard",
            ModelFormat::DeepSeek => "deepseek",
            ModelFormat::Qwen => "qwen",
            ModelFormat::Kimi => "kimi",
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

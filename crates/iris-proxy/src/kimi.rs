//! Kimi sentinel-token tool call grammar.
//!
//! Kimi K2 models emit tool calls inside the text content:
//!
//! ```text
//! <|tool_calls_section_begin|>
//! <|tool_call_begin|> functions.get_weather:0 <|tool_call_argument_begin|> {"city":"Beijing"} <|tool_call_end|>
//! <|tool_calls_section_end|>
//! ```

use crate::error::TranslateError;
use crate::openai::ToolCall;
use lazy_static::lazy_static;
use regex::Regex;

pub const SECTION_BEGIN: &str = "<|tool_calls_section_begin|>";
pub const SECTION_END: &str = "<|tool_calls_section_end|>";
pub const CALL_BEGIN: &str = "<|tool_call_begin|>";
pub const ARGUMENT_BEGIN: &str = "<|tool_call_argument_begin|>";
pub const CALL_END: &str = "<|tool_call_end|>";

lazy_static! {
    static ref CALL_RECORD: Regex = Regex::new(&format!(
        r"(?s){}\s*(?P<id>.*?)\s*{}\s*(?P<args>.*?)\s*{}",
        regex::escape(CALL_BEGIN),
        regex::escape(ARGUMENT_BEGIN),
        regex::escape(CALL_END),
    ))
    .unwrap();
    static ref CALL_ID: Regex = Regex::new(r"^functions\.(?P<name>.+):(?P<index>\d+)$").unwrap();
}

/// Force compilation of the sentinel patterns.
pub fn init_patterns() {
    lazy_static::initialize(&CALL_RECORD);
    lazy_static::initialize(&CALL_ID);
}

/// Text content split around a tool call section.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedContent {
    /// Text outside the section, with the section removed.
    pub text: String,
    pub calls: Vec<ToolCall>,
}

/// Extract the tool calls embedded in `text`.
///
/// Text without a section carries no calls. A section that is opened but never
/// closed is an error.
pub fn parse_tool_calls(text: &str) -> Result<Vec<ToolCall>, TranslateError> {
    parse_content(text).map(|parsed| parsed.calls)
}

/// Like [`parse_tool_calls`], also returning the surrounding text.
pub fn parse_content(text: &str) -> Result<ParsedContent, TranslateError> {
    let Some(begin) = text.find(SECTION_BEGIN) else {
        return Ok(ParsedContent {
            text: text.to_string(),
            calls: Vec::new(),
        });
    };

    let body_start = begin + SECTION_BEGIN.len();
    let body_len = text[body_start..]
        .find(SECTION_END)
        .ok_or(TranslateError::MissingSectionEnd)?;
    let body = &text[body_start..body_start + body_len];
    let after = &text[body_start + body_len + SECTION_END.len()..];

    Ok(ParsedContent {
        text: format!("{}{}", &text[..begin], after),
        calls: parse_section_body(body)?,
    })
}

/// Parse the call records between the section sentinels.
pub fn parse_section_body(body: &str) -> Result<Vec<ToolCall>, TranslateError> {
    CALL_RECORD
        .captures_iter(body)
        .map(|caps| {
            let id = caps["id"].to_string();
            let args = &caps["args"];

            let name = CALL_ID
                .captures(&id)
                .map(|m| m["name"].to_string())
                .ok_or_else(|| TranslateError::InvalidIdFormat { id: id.clone() })?;

            serde_json::from_str::<serde_json::Value>(args).map_err(|source| {
                TranslateError::InvalidJsonArguments {
                    id: id.clone(),
                    source,
                }
            })?;

            Ok(ToolCall::function(id, name, args))
        })
        .collect()
}

/// Length of the longest suffix of `text` that is a proper prefix of `pattern`.
///
/// Used by the stream buffer to hold back text that may turn out to be the
/// start of a sentinel split across chunks.
pub fn partial_sentinel_len(text: &str, pattern: &str) -> usize {
    (1..pattern.len().min(text.len() + 1))
        .rev()
        .find(|&n| text.is_char_boundary(text.len() - n) && text.ends_with(&pattern[..n]))
        .unwrap_or(0)
}

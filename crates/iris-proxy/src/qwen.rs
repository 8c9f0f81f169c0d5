//! Dual-format tool call extraction.
//!
//! Qwen models (and most OpenAI-compatible backends) report tool calls either
//! as a `tool_calls` array or, on older deployments, as a single
//! `function_call` object that carries no id.

use crate::openai::{
    ChunkDelta, FunctionCall, ResponseMessage, ToolCall, WireFunction, WireToolCall,
};
use std::sync::atomic::{AtomicU64, Ordering};

static CALL_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generate a tool call id that is unique across concurrent streams.
pub fn generate_call_id() -> String {
    let seq = CALL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("call_{}_{}", chrono::Utc::now().timestamp_millis(), seq)
}

/// Anything that may carry tool calls in either encoding.
pub trait ToolCallCarrier {
    fn tool_calls(&self) -> Option<&[WireToolCall]>;
    fn function_call(&self) -> Option<&WireFunction>;
}

impl ToolCallCarrier for ResponseMessage {
    fn tool_calls(&self) -> Option<&[WireToolCall]> {
        self.tool_calls.as_deref()
    }

    fn function_call(&self) -> Option<&WireFunction> {
        self.function_call.as_ref()
    }
}

impl ToolCallCarrier for ChunkDelta {
    fn tool_calls(&self) -> Option<&[WireToolCall]> {
        self.tool_calls.as_deref()
    }

    fn function_call(&self) -> Option<&WireFunction> {
        self.function_call.as_ref()
    }
}

/// Collect complete tool calls from a buffered message.
///
/// The `tool_calls` array wins when present; entries without an id get a
/// generated one. Otherwise a legacy `function_call` yields exactly one call.
pub fn parse<C: ToolCallCarrier + ?Sized>(carrier: &C) -> Vec<ToolCall> {
    if let Some(calls) = carrier.tool_calls().filter(|calls| !calls.is_empty()) {
        return calls
            .iter()
            .map(|call| {
                let function = call.function.clone().unwrap_or_default();
                ToolCall {
                    id: call.id.clone().unwrap_or_else(generate_call_id),
                    kind: call.kind.clone().unwrap_or_else(|| "function".to_string()),
                    function: FunctionCall {
                        name: function.name.unwrap_or_default(),
                        arguments: function.arguments.unwrap_or_default(),
                    },
                }
            })
            .collect();
    }

    match carrier.function_call() {
        Some(function) => vec![ToolCall::function(
            generate_call_id(),
            function.name.clone().unwrap_or_default(),
            function.arguments.clone().unwrap_or_default(),
        )],
        None => Vec::new(),
    }
}

/// A piece of a tool call seen in one streaming delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallFragment {
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: String,
}

/// Per-delta counterpart of [`parse`]: ids are not synthesized here because a
/// missing id usually means "continue the open call".
pub fn fragments<C: ToolCallCarrier + ?Sized>(carrier: &C) -> Vec<ToolCallFragment> {
    if let Some(calls) = carrier.tool_calls().filter(|calls| !calls.is_empty()) {
        return calls
            .iter()
            .map(|call| {
                let function = call.function.as_ref();
                ToolCallFragment {
                    id: call.id.clone().filter(|id| !id.is_empty()),
                    name: function
                        .and_then(|f| f.name.clone())
                        .filter(|name| !name.is_empty()),
                    arguments: function
                        .and_then(|f| f.arguments.clone())
                        .unwrap_or_default(),
                }
            })
            .collect();
    }

    match carrier.function_call() {
        Some(function) => vec![ToolCallFragment {
            id: None,
            name: function.name.clone().filter(|name| !name.is_empty()),
            arguments: function.arguments.clone().unwrap_or_default(),
        }],
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn delta(value: serde_json::Value) -> ChunkDelta {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_legacy_function_call() {
        let delta = delta(json!({
            "function_call": {"name": "get_weather", "arguments": "{\"city\":\"Beijing\"}"}
        }));
        let calls = parse(&delta);
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].id.is_empty());
        assert_eq!(calls[0].kind, "function");
        assert_eq!(calls[0].function.name, "get_weather");
        assert_eq!(calls[0].function.arguments, r#"{"city":"Beijing"}"#);
    }

    #[test]
    fn test_structured_array_preserves_order_and_ids() {
        let message: ResponseMessage = serde_json::from_value(json!({
            "tool_calls": [
                {"id": "call_a", "type": "function", "function": {"name": "a", "arguments": "{}"}},
                {"id": "call_b", "type": "function", "function": {"name": "b", "arguments": "{\"x\":1}"}}
            ],
            "function_call": {"name": "ignored", "arguments": "{}"}
        }))
        .unwrap();
        let calls = parse(&message);
        assert_eq!(
            calls,
            vec![
                ToolCall::function("call_a", "a", "{}"),
                ToolCall::function("call_b", "b", "{\"x\":1}"),
            ]
        );
    }

    #[test]
    fn test_neither_field_is_empty() {
        assert!(parse(&delta(json!({"content": "hi"}))).is_empty());
        assert!(fragments(&delta(json!({"content": "hi"}))).is_empty());
    }

    #[test]
    fn test_generated_ids_are_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..250).map(|_| generate_call_id()).collect::<Vec<_>>()))
            .collect();
        let ids: HashSet<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_fragments_keep_missing_ids() {
        let first = delta(json!({
            "tool_calls": [{"index": 0, "id": "call_1", "function": {"name": "get_weather", "arguments": ""}}]
        }));
        let next = delta(json!({
            "tool_calls": [{"index": 0, "function": {"arguments": "{\"city\""}}]
        }));

        assert_eq!(
            fragments(&first),
            vec![ToolCallFragment {
                id: Some("call_1".to_string()),
                name: Some("get_weather".to_string()),
                arguments: String::new(),
            }]
        );
        assert_eq!(
            fragments(&next),
            vec![ToolCallFragment {
                id: None,
                name: None,
                arguments: "{\"city\"".to_string(),
            }]
        );
    }

    #[test]
    fn test_legacy_fragment_has_no_id() {
        let legacy = delta(json!({"function_call": {"arguments": ":\"Beijing\"}"}}));
        let frags = fragments(&legacy);
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].id, None);
        assert_eq!(frags[0].name, None);
    }
}

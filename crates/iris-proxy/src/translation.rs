//! Anthropic <-> OpenAI-compatible translation.
//!
//! This module implements the buffered format conversions:
//! - Anthropic `/v1/messages` request -> `chat/completions` request
//! - `chat/completions` response -> Anthropic `/v1/messages` response

use crate::error::TranslateError;
use crate::format::ModelFormat;
use crate::openai::{
    ChatContent, ChatMessage, ChatRequest, ChatResponse, ChatRole, ChatTool, ContentPart,
    FunctionSpec, ToolCall,
};
use crate::resolve::resolve_model;
use crate::schema::clean_schema;
use crate::types::{
    Content, ContentBlock, Message, MessagesRequest, MessagesResponse, Role, StopReason,
    SystemContent, Usage,
};
use crate::validation::validate_tool_calls;
use crate::{kimi, qwen};
use iris_config::{ModelSettings, RoutingSettings};
use tracing::debug;

/// Convert an Anthropic Messages request into a `chat/completions` request.
pub fn convert_request(
    req: &MessagesRequest,
    models: &ModelSettings,
    routing: &RoutingSettings,
) -> Result<ChatRequest, TranslateError> {
    let mut messages = Vec::with_capacity(req.messages.len() + 1);

    if let Some(system) = &req.system {
        messages.push(convert_system(system));
    }

    for msg in &req.messages {
        expand_message(msg, &mut messages)?;
    }

    let messages = validate_tool_calls(messages);
    let resolved = resolve_model(&req.model, models, routing);
    debug!(
        client_model = %req.model,
        backend_model = %resolved.model,
        routed = resolved.routing.is_some(),
        "resolved model"
    );

    let tools = req
        .tools
        .as_ref()
        .filter(|tools| !tools.is_empty())
        .map(|tools| {
            tools
                .iter()
                .map(|tool| ChatTool {
                    kind: "function".to_string(),
                    function: FunctionSpec {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: clean_schema(&tool.input_schema),
                    },
                })
                .collect()
        });

    Ok(ChatRequest {
        model: resolved.model,
        messages,
        tools,
        temperature: req.temperature,
        max_tokens: req.max_tokens,
        stream: req.stream.then_some(true),
        provider: resolved.routing,
    })
}

fn convert_system(system: &SystemContent) -> ChatMessage {
    let content = match system {
        SystemContent::String(text) => ChatContent::Text(text.clone()),
        SystemContent::Blocks(blocks) => ChatContent::Parts(
            blocks
                .iter()
                .map(|block| ContentPart::Text {
                    text: block.text().to_string(),
                })
                .collect(),
        ),
    };
    ChatMessage::new(ChatRole::System, Some(content))
}

/// Expand one client message into zero or more backend messages.
fn expand_message(msg: &Message, out: &mut Vec<ChatMessage>) -> Result<(), TranslateError> {
    let role = match msg.role {
        Role::User => ChatRole::User,
        Role::Assistant => ChatRole::Assistant,
    };

    let blocks = match &msg.content {
        Content::String(text) => {
            out.push(ChatMessage::text(role, text.clone()));
            return Ok(());
        }
        Content::Blocks(blocks) => blocks,
    };

    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block {
            ContentBlock::Text { text: t } => text.push_str(t),
            ContentBlock::ToolUse { id, name, input } => {
                if msg.role == Role::User {
                    debug!(tool_use_id = %id, "ignoring tool_use block in user message");
                    continue;
                }
                let arguments = serde_json::to_string(input).map_err(|e| {
                    TranslateError::InvalidRequest(format!("tool_use {id} input: {e}"))
                })?;
                tool_calls.push(ToolCall::function(id.clone(), name.clone(), arguments));
            }
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } => {
                if msg.role == Role::Assistant {
                    debug!(%tool_use_id, "ignoring tool_result block in assistant message");
                    continue;
                }
                // Results go first so they stay adjacent to the assistant turn.
                out.push(ChatMessage::tool_result(
                    tool_use_id.clone(),
                    content.to_plaintext(),
                ));
            }
        }
    }

    match msg.role {
        Role::User => {
            if !text.is_empty() {
                out.push(ChatMessage::text(ChatRole::User, text));
            }
        }
        Role::Assistant => {
            let content = (!text.is_empty()).then_some(ChatContent::Text(text));
            let mut assistant = ChatMessage::new(ChatRole::Assistant, content);
            assistant.tool_calls = tool_calls;
            out.push(assistant);
        }
    }

    Ok(())
}

/// Decode a raw backend body into the lenient response type.
pub fn decode_response(body: &[u8]) -> Result<ChatResponse, TranslateError> {
    serde_json::from_slice(body).map_err(|e| TranslateError::UpstreamDecode(e.to_string()))
}

/// Convert a `chat/completions` response into an Anthropic Messages response.
///
/// `model` is the resolved backend model id and `format` its detected dialect.
pub fn convert_response(
    resp: ChatResponse,
    model: &str,
    format: ModelFormat,
) -> Result<MessagesResponse, TranslateError> {
    let choice = resp
        .choices
        .ok_or(TranslateError::MissingChoices)?
        .into_iter()
        .next()
        .ok_or(TranslateError::EmptyChoices)?;
    let message = choice.message.ok_or(TranslateError::MissingMessage)?;

    let mut stop_reason = StopReason::from_finish_reason(choice.finish_reason.as_deref());
    let mut text = message.content.clone().unwrap_or_default();
    let mut calls = qwen::parse(&message);

    if format == ModelFormat::Kimi {
        let parsed = kimi::parse_content(&text)?;
        if !parsed.calls.is_empty() {
            debug!(count = parsed.calls.len(), "parsed kimi tool calls from content");
            stop_reason = StopReason::ToolUse;
        }
        text = parsed.text;
        calls.extend(parsed.calls);
    }

    let mut content = Vec::with_capacity(calls.len() + 1);
    if !text.is_empty() {
        content.push(ContentBlock::Text { text });
    }
    for call in calls {
        content.push(tool_use_block(call)?);
    }

    let usage = resp
        .usage
        .map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(MessagesResponse {
        id: resp.id.unwrap_or_else(generate_message_id),
        kind: "message".to_string(),
        role: Role::Assistant,
        content,
        model: model.to_string(),
        stop_reason,
        stop_sequence: None,
        usage,
    })
}

fn tool_use_block(call: ToolCall) -> Result<ContentBlock, TranslateError> {
    let arguments = call.function.arguments.trim();
    let input = if arguments.is_empty() {
        serde_json::Value::Object(Default::default())
    } else {
        serde_json::from_str(arguments).map_err(|source| TranslateError::InvalidJsonArguments {
            id: call.id.clone(),
            source,
        })?
    };

    Ok(ContentBlock::ToolUse {
        id: call.id,
        name: call.function.name,
        input,
    })
}

pub fn generate_message_id() -> String {
    format!("msg_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TextBlock, Tool, ToolResultContent};
    use iris_config::RoutingPolicy;
    use serde_json::json;

    fn request(messages: Vec<Message>) -> MessagesRequest {
        MessagesRequest {
            model: "claude-3-5-sonnet".to_string(),
            messages,
            system: None,
            max_tokens: None,
            stream: false,
            temperature: None,
            tools: None,
        }
    }

    fn models() -> ModelSettings {
        ModelSettings {
            sonnet: Some("vendor/sonnet-model".to_string()),
            ..Default::default()
        }
    }

    fn convert(req: &MessagesRequest) -> ChatRequest {
        convert_request(req, &models(), &RoutingSettings::default()).unwrap()
    }

    #[test]
    fn test_simple_request_maps_model_and_message() {
        let mut req = request(vec![Message::user("Hello")]);
        req.tools = Some(vec![]);

        let out = convert(&req);
        assert_eq!(out.model, "vendor/sonnet-model");
        assert_eq!(out.messages, vec![ChatMessage::text(ChatRole::User, "Hello")]);
        assert_eq!(out.tools, None);
        assert_eq!(out.stream, None);
    }

    #[test]
    fn test_system_prompt_forms() {
        let mut req = request(vec![Message::user("hi")]);
        req.system = Some(SystemContent::String("sys".to_string()));
        let out = convert(&req);
        assert_eq!(out.messages[0], ChatMessage::text(ChatRole::System, "sys"));

        req.system = Some(SystemContent::Blocks(vec![
            TextBlock::Text {
                text: "first".to_string(),
            },
            TextBlock::Text {
                text: "second".to_string(),
            },
        ]));
        let out = convert(&req);
        assert_eq!(
            serde_json::to_value(&out.messages[0]).unwrap(),
            json!({
                "role": "system",
                "content": [{"type": "text", "text": "first"}, {"type": "text", "text": "second"}]
            })
        );
    }

    #[test]
    fn test_tool_round_trip_conversation() {
        let req = request(vec![
            Message::user("weather in Beijing?"),
            Message::with_blocks(
                Role::Assistant,
                vec![
                    ContentBlock::Text {
                        text: "Checking".to_string(),
                    },
                    ContentBlock::ToolUse {
                        id: "call_1".to_string(),
                        name: "get_weather".to_string(),
                        input: json!({"city": "Beijing"}),
                    },
                ],
            ),
            Message::with_blocks(
                Role::User,
                vec![
                    ContentBlock::ToolResult {
                        tool_use_id: "call_1".to_string(),
                        content: ToolResultContent::String("sunny".to_string()),
                        is_error: None,
                    },
                    ContentBlock::Text {
                        text: "and tomorrow?".to_string(),
                    },
                ],
            ),
        ]);

        let out = convert(&req);
        let wire = serde_json::to_value(&out.messages).unwrap();
        assert_eq!(
            wire,
            json!([
                {"role": "user", "content": "weather in Beijing?"},
                {
                    "role": "assistant",
                    "content": "Checking",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{\"city\":\"Beijing\"}"}
                    }]
                },
                {"role": "tool", "content": "sunny", "tool_call_id": "call_1"},
                {"role": "user", "content": "and tomorrow?"}
            ])
        );
    }

    #[test]
    fn test_unanswered_tool_use_is_removed_before_sending() {
        let req = request(vec![
            Message::with_blocks(
                Role::Assistant,
                vec![ContentBlock::ToolUse {
                    id: "call_1".to_string(),
                    name: "get_weather".to_string(),
                    input: json!({}),
                }],
            ),
            Message::user("continue"),
        ]);
        let out = convert(&req);
        assert_eq!(out.messages, vec![ChatMessage::text(ChatRole::User, "continue")]);
    }

    #[test]
    fn test_tools_are_cleaned_and_routing_attached() {
        let mut req = request(vec![Message::user("hi")]);
        req.stream = true;
        req.temperature = Some(0.2);
        req.tools = Some(vec![Tool {
            name: "fetch".to_string(),
            description: Some("Fetch a page".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {"url": {"type": "string", "format": "uri"}}
            }),
        }]);
        let routing = RoutingSettings {
            sonnet: Some(RoutingPolicy {
                order: vec!["groq".to_string()],
                allow_fallbacks: false,
            }),
            ..Default::default()
        };

        let out = convert_request(&req, &models(), &routing).unwrap();
        let tools = out.tools.unwrap();
        assert_eq!(tools[0].kind, "function");
        assert_eq!(
            tools[0].function.parameters,
            json!({"type": "object", "properties": {"url": {"type": "string"}}})
        );
        assert_eq!(out.stream, Some(true));
        assert_eq!(out.temperature, Some(0.2));
        assert_eq!(out.provider.unwrap().order, vec!["groq".to_string()]);
    }

    fn response(value: serde_json::Value) -> ChatResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_response_shape_errors() {
        let err = convert_response(response(json!({})), "m", ModelFormat::Standard).unwrap_err();
        assert_eq!(err.kind(), "missing_choices");

        let err = convert_response(response(json!({"choices": []})), "m", ModelFormat::Standard)
            .unwrap_err();
        assert_eq!(err.kind(), "empty_choices");

        let err = convert_response(
            response(json!({"choices": [{"finish_reason": "stop"}]})),
            "m",
            ModelFormat::Standard,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "missing_message");
    }

    #[test]
    fn test_response_with_tool_calls() {
        let resp = response(json!({
            "id": "chatcmpl_123",
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "do", "arguments": "{\"x\":1}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2}
        }));

        let out = convert_response(resp, "openai/gpt-4.1", ModelFormat::Standard).unwrap();
        assert_eq!(out.id, "chatcmpl_123");
        assert_eq!(out.stop_reason, StopReason::ToolUse);
        assert_eq!(
            out.content,
            vec![ContentBlock::ToolUse {
                id: "call_1".to_string(),
                name: "do".to_string(),
                input: json!({"x": 1}),
            }]
        );
        assert_eq!(
            out.usage,
            Usage {
                input_tokens: 3,
                output_tokens: 2
            }
        );
    }

    #[test]
    fn test_response_text_and_finish_reasons() {
        let resp = response(json!({
            "choices": [{"finish_reason": "length", "message": {"content": "Hello!"}}]
        }));
        let out = convert_response(resp, "m", ModelFormat::Standard).unwrap();
        assert!(out.id.starts_with("msg_"));
        assert_eq!(out.stop_reason, StopReason::EndTurn);
        assert_eq!(
            out.content,
            vec![ContentBlock::Text {
                text: "Hello!".to_string()
            }]
        );
    }

    #[test]
    fn test_qwen_legacy_function_call_response() {
        let resp = response(json!({
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {"function_call": {"name": "get_weather", "arguments": "{\"city\":\"Beijing\"}"}}
            }]
        }));
        let out = convert_response(resp, "qwen/qwen3", ModelFormat::Qwen).unwrap();
        let [ContentBlock::ToolUse { id, name, input }] = out.content.as_slice() else {
            panic!("expected one tool_use block, got {:?}", out.content);
        };
        assert!(!id.is_empty());
        assert_eq!(name, "get_weather");
        assert_eq!(input, &json!({"city": "Beijing"}));
    }

    #[test]
    fn test_kimi_sentinels_in_content() {
        let content = format!(
            "I'll check.{}{} functions.get_weather:0 {}{{\"city\":\"Beijing\"}}{}{}",
            kimi::SECTION_BEGIN,
            kimi::CALL_BEGIN,
            kimi::ARGUMENT_BEGIN,
            kimi::CALL_END,
            kimi::SECTION_END
        );
        let resp = response(json!({
            "choices": [{"finish_reason": "stop", "message": {"content": content}}]
        }));

        let out = convert_response(resp, "moonshotai/kimi-k2", ModelFormat::Kimi).unwrap();
        assert_eq!(out.stop_reason, StopReason::ToolUse);
        assert_eq!(
            out.content,
            vec![
                ContentBlock::Text {
                    text: "I'll check.".to_string()
                },
                ContentBlock::ToolUse {
                    id: "functions.get_weather:0".to_string(),
                    name: "get_weather".to_string(),
                    input: json!({"city": "Beijing"}),
                }
            ]
        );
    }

    #[test]
    fn test_kimi_sentinels_ignored_for_other_formats() {
        let content = format!("{}never closed", kimi::SECTION_BEGIN);
        let resp = response(json!({"choices": [{"message": {"content": content.clone()}}]}));
        let out = convert_response(resp, "m", ModelFormat::Standard).unwrap();
        assert_eq!(out.content, vec![ContentBlock::Text { text: content.clone() }]);

        let resp = response(json!({"choices": [{"message": {"content": content}}]}));
        let err = convert_response(resp, "kimi", ModelFormat::Kimi).unwrap_err();
        assert_eq!(err.kind(), "missing_section_end");
    }

    #[test]
    fn test_invalid_tool_arguments_are_classified() {
        let resp = response(json!({
            "choices": [{"message": {"tool_calls": [
                {"id": "call_1", "function": {"name": "a", "arguments": "{oops"}}
            ]}}]
        }));
        let err = convert_response(resp, "m", ModelFormat::Standard).unwrap_err();
        assert_eq!(err.kind(), "invalid_json_arguments");
    }

    #[test]
    fn test_decode_response_rejects_non_json() {
        let err = decode_response(b"<html>bad gateway</html>").unwrap_err();
        assert_eq!(err.kind(), "upstream_decode");
    }
}

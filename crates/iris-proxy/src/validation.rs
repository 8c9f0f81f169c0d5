//! Tool call / tool result pairing for OpenAI-compatible backends.
//!
//! OpenAI-style backends reject a conversation in which an assistant tool call
//! is not answered by a `tool` message right after it, or in which a `tool`
//! message answers nothing. Clients routinely produce both (interrupted turns,
//! truncated history), so the pairing is repaired by deletion:
//! - unanswered tool calls are removed from their assistant message
//! - `tool` messages that answer no call of the preceding assistant message
//!   are removed
//! - assistant messages left with neither text nor tool calls are removed

use crate::openai::{ChatMessage, ChatRole};
use std::collections::HashSet;
use tracing::warn;

/// Repair call/result pairing. See the module docs for the rules.
pub fn validate_tool_calls(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut result = Vec::with_capacity(messages.len());
    let mut iter = messages.into_iter().peekable();

    while let Some(msg) = iter.next() {
        match msg.role {
            ChatRole::Tool => {
                // Not part of a run that follows an assistant message.
                warn!(
                    tool_call_id = msg.tool_call_id.as_deref().unwrap_or_default(),
                    "dropping orphaned tool result"
                );
            }
            ChatRole::Assistant => {
                let mut run = Vec::new();
                while let Some(next) = iter.next_if(|m| m.role == ChatRole::Tool) {
                    run.push(next);
                }

                let (assistant, results) = pair_run(msg, run);
                if assistant.has_content() || !assistant.tool_calls.is_empty() {
                    result.push(assistant);
                } else {
                    warn!("dropping empty assistant message");
                }
                result.extend(results);
            }
            ChatRole::System | ChatRole::User => result.push(msg),
        }
    }

    result
}

/// Match an assistant message against the `tool` messages right after it.
fn pair_run(
    mut assistant: ChatMessage,
    run: Vec<ChatMessage>,
) -> (ChatMessage, Vec<ChatMessage>) {
    let mut call_ids = HashSet::new();
    assistant.tool_calls.retain(|call| {
        let first = call_ids.insert(call.id.clone());
        if !first {
            warn!(tool_call_id = %call.id, "dropping duplicate tool call");
        }
        first
    });

    let mut answered: HashSet<String> = HashSet::new();
    let results: Vec<ChatMessage> = run
        .into_iter()
        .filter(|m| match m.tool_call_id.as_deref() {
            Some(id) if call_ids.contains(id) && answered.insert(id.to_string()) => true,
            other => {
                warn!(
                    tool_call_id = other.unwrap_or_default(),
                    "dropping tool result with no matching call"
                );
                false
            }
        })
        .collect();

    assistant.tool_calls.retain(|call| {
        let keep = answered.contains(&call.id);
        if !keep {
            warn!(tool_call_id = %call.id, name = %call.function.name, "dropping unanswered tool call");
        }
        keep
    });

    (assistant, results)
}

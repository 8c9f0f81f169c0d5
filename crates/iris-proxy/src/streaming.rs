//! Streaming conversion (SSE).
//!
//! OpenAI-compatible backends stream `chat.completion.chunk` payloads. Anthropic
//! clients expect a strict event grammar instead:
//!
//! ```text
//! message_start
//! (content_block_start content_block_delta* content_block_stop)*
//! message_delta
//! message_stop
//! ```
//!
//! [`StreamTranslator`] is the synchronous state machine that turns one chunk
//! at a time into Anthropic events. [`translate_stream`] drives it from a raw
//! backend byte stream.
//!
//! Kimi models do not report tool calls structurally; they write them into the
//! text between sentinels. For those models text is routed through a buffer
//! that forwards plain text immediately, holds back anything that could be the
//! start of a section, and turns each completed section into tool-use blocks.

use crate::error::{ErrorBody, TranslateError};
use crate::format::ModelFormat;
use crate::kimi::{self, SECTION_BEGIN, SECTION_END};
use crate::openai::{ChatChunk, ChunkDelta};
use crate::qwen::{self, ToolCallFragment};
use crate::sse::{sse_data, sse_event, SseData};
use crate::translation::generate_message_id;
use crate::types::{StopReason, Usage};
use async_stream::stream;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt::Display;
use tracing::{debug, warn};

/// One Anthropic streaming event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart {
        message: MessageStart,
    },
    ContentBlockStart {
        index: usize,
        content_block: BlockStart,
    },
    ContentBlockDelta {
        index: usize,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        delta: MessageDeltaBody,
        usage: Usage,
    },
    MessageStop,
    Error {
        error: ErrorBody,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageStart {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub role: &'static str,
    pub model: String,
    pub content: Vec<Value>,
    pub stop_reason: Option<StopReason>,
    pub stop_sequence: Option<String>,
    pub usage: Usage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockStart {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageDeltaBody {
    pub stop_reason: StopReason,
    pub stop_sequence: Option<String>,
}

impl StreamEvent {
    /// SSE `event:` name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageStart { .. } => "message_start",
            Self::ContentBlockStart { .. } => "content_block_start",
            Self::ContentBlockDelta { .. } => "content_block_delta",
            Self::ContentBlockStop { .. } => "content_block_stop",
            Self::MessageDelta { .. } => "message_delta",
            Self::MessageStop => "message_stop",
            Self::Error { .. } => "error",
        }
    }

    /// Format as a complete SSE frame.
    pub fn to_sse(&self) -> String {
        let data = serde_json::to_value(self).unwrap_or_else(|e| {
            json!({
                "type": "error",
                "error": {"type": "api_error", "message": e.to_string()},
            })
        });
        sse_event(self.name(), &data)
    }
}

/// Text held back while watching for a Kimi tool call section.
#[derive(Debug, Default)]
struct KimiBufferState {
    buffer: String,
    limit: usize,
    section_open: bool,
}

impl KimiBufferState {
    fn check_ceiling(&self) -> Result<(), TranslateError> {
        if self.buffer.len() > self.limit {
            return Err(TranslateError::Overloaded {
                size: self.buffer.len(),
                limit: self.limit,
            });
        }
        Ok(())
    }
}

/// Per-stream bookkeeping. Owned by exactly one stream.
#[derive(Debug, Default)]
struct StreamState {
    message_id: Option<String>,
    started: bool,
    finished: bool,

    /// Index of the open block, or of the next block to open.
    index: usize,
    text_open: bool,
    tool_open: bool,
    current_tool_id: Option<String>,
    tool_arguments: HashMap<String, String>,
    saw_tool_use: bool,

    usage: Usage,
    kimi: KimiBufferState,
}

/// Converts backend chunks into Anthropic events.
#[derive(Debug)]
pub struct StreamTranslator {
    model: String,
    format: ModelFormat,
    state: StreamState,
}

impl StreamTranslator {
    /// `model` is the name reported in `message_start`.
    pub fn new(model: impl Into<String>, format: ModelFormat, kimi_buffer_limit: usize) -> Self {
        Self {
            model: model.into(),
            format,
            state: StreamState {
                kimi: KimiBufferState {
                    limit: kimi_buffer_limit,
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    /// Whether a terminal event (`message_stop` or `error`) has been produced.
    pub fn is_finished(&self) -> bool {
        self.state.finished
    }

    /// Arguments accumulated so far for a streamed tool call.
    pub fn tool_arguments(&self, id: &str) -> Option<&str> {
        self.state.tool_arguments.get(id).map(String::as_str)
    }

    /// Handle one decoded SSE payload.
    pub fn on_payload(&mut self, payload: SseData) -> Vec<StreamEvent> {
        match payload {
            SseData::Done => self.finish(),
            SseData::Json(data) => match serde_json::from_str::<ChatChunk>(&data) {
                Ok(chunk) => self.on_chunk(chunk),
                Err(e) => self.fail(TranslateError::InvalidStreamChunk(e.to_string())),
            },
        }
    }

    /// Handle one backend chunk.
    pub fn on_chunk(&mut self, chunk: ChatChunk) -> Vec<StreamEvent> {
        if self.state.finished {
            return Vec::new();
        }

        let mut events = Vec::new();
        if self.state.message_id.is_none() {
            self.state.message_id = chunk.id.clone().filter(|id| !id.is_empty());
        }
        self.ensure_started(&mut events);

        if let Some(message) = chunk.error_message() {
            events.extend(self.fail(TranslateError::Upstream(message)));
            return events;
        }

        if let Some(usage) = chunk.usage {
            self.state.usage = Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            };
        }

        // Only single-choice completions are requested.
        if let Some(choice) = chunk.choices.into_iter().next() {
            if let Err(err) = self.apply_delta(choice.delta, &mut events) {
                events.extend(self.fail(err));
            }
        }

        events
    }

    /// Finish the stream: flush held text, close the open block and report the
    /// stop reason. Called on `[DONE]` and on end of input alike.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.state.finished {
            return Vec::new();
        }

        let mut events = Vec::new();
        self.ensure_started(&mut events);

        if self.format == ModelFormat::Kimi {
            if self.state.kimi.section_open {
                events.extend(self.fail(TranslateError::MissingSectionEnd));
                return events;
            }
            let held = std::mem::take(&mut self.state.kimi.buffer);
            self.push_text(&held, &mut events);
        }

        self.close_block(&mut events);

        let stop_reason = if self.state.saw_tool_use {
            StopReason::ToolUse
        } else {
            StopReason::EndTurn
        };
        events.push(StreamEvent::MessageDelta {
            delta: MessageDeltaBody {
                stop_reason,
                stop_sequence: None,
            },
            usage: self.state.usage,
        });
        events.push(StreamEvent::MessageStop);
        self.state.finished = true;
        events
    }

    /// Terminate with an `error` event. Nothing is emitted afterwards.
    pub fn fail(&mut self, err: TranslateError) -> Vec<StreamEvent> {
        if self.state.finished {
            return Vec::new();
        }
        warn!(kind = err.kind(), error = %err, "aborting stream");
        self.state.finished = true;
        vec![StreamEvent::Error { error: err.body() }]
    }

    fn ensure_started(&mut self, events: &mut Vec<StreamEvent>) {
        if self.state.started {
            return;
        }
        self.state.started = true;

        let id = self
            .state
            .message_id
            .get_or_insert_with(generate_message_id)
            .clone();
        events.push(StreamEvent::MessageStart {
            message: MessageStart {
                id,
                kind: "message",
                role: "assistant",
                model: self.model.clone(),
                content: Vec::new(),
                stop_reason: None,
                stop_sequence: None,
                usage: Usage::default(),
            },
        });
    }

    fn apply_delta(
        &mut self,
        delta: ChunkDelta,
        events: &mut Vec<StreamEvent>,
    ) -> Result<(), TranslateError> {
        if let Some(text) = delta.content.as_deref() {
            if self.format == ModelFormat::Kimi {
                self.push_kimi_text(text, events)?;
            } else {
                self.push_text(text, events);
            }
        }

        for fragment in qwen::fragments(&delta) {
            self.push_tool_fragment(fragment, events);
        }
        Ok(())
    }

    fn push_text(&mut self, text: &str, events: &mut Vec<StreamEvent>) {
        if text.is_empty() {
            return;
        }
        if !self.state.text_open {
            self.close_block(events);
            events.push(StreamEvent::ContentBlockStart {
                index: self.state.index,
                content_block: BlockStart::Text {
                    text: String::new(),
                },
            });
            self.state.text_open = true;
        }
        events.push(StreamEvent::ContentBlockDelta {
            index: self.state.index,
            delta: BlockDelta::TextDelta {
                text: text.to_string(),
            },
        });
    }

    fn push_tool_fragment(&mut self, fragment: ToolCallFragment, events: &mut Vec<StreamEvent>) {
        let continues_open_call = match fragment.id.as_deref() {
            Some(id) => self.state.tool_open && self.state.current_tool_id.as_deref() == Some(id),
            None => self.state.tool_open && fragment.name.is_none(),
        };
        if continues_open_call {
            self.push_arguments(&fragment.arguments, events);
            return;
        }

        let id = match fragment.id {
            Some(id) => id,
            None if fragment.name.is_some() => qwen::generate_call_id(),
            None => {
                debug!("ignoring tool call fragment with no open call");
                return;
            }
        };
        self.open_tool(id, fragment.name.unwrap_or_default(), events);
        self.push_arguments(&fragment.arguments, events);
    }

    fn open_tool(&mut self, id: String, name: String, events: &mut Vec<StreamEvent>) {
        self.close_block(events);
        debug!(index = self.state.index, tool_call_id = %id, name = %name, "opening tool_use block");

        events.push(StreamEvent::ContentBlockStart {
            index: self.state.index,
            content_block: BlockStart::ToolUse {
                id: id.clone(),
                name,
                input: json!({}),
            },
        });
        self.state.tool_arguments.entry(id.clone()).or_default();
        self.state.current_tool_id = Some(id);
        self.state.tool_open = true;
        self.state.saw_tool_use = true;
    }

    fn push_arguments(&mut self, arguments: &str, events: &mut Vec<StreamEvent>) {
        if arguments.is_empty() {
            return;
        }
        if let Some(id) = self.state.current_tool_id.as_ref() {
            self.state
                .tool_arguments
                .entry(id.clone())
                .or_default()
                .push_str(arguments);
        }
        events.push(StreamEvent::ContentBlockDelta {
            index: self.state.index,
            delta: BlockDelta::InputJsonDelta {
                partial_json: arguments.to_string(),
            },
        });
    }

    fn close_block(&mut self, events: &mut Vec<StreamEvent>) {
        if !self.state.text_open && !self.state.tool_open {
            return;
        }
        events.push(StreamEvent::ContentBlockStop {
            index: self.state.index,
        });
        self.state.index += 1;
        self.state.text_open = false;
        self.state.tool_open = false;
        self.state.current_tool_id = None;
    }

    fn push_kimi_text(
        &mut self,
        text: &str,
        events: &mut Vec<StreamEvent>,
    ) -> Result<(), TranslateError> {
        self.state.kimi.buffer.push_str(text);

        loop {
            if !self.state.kimi.section_open {
                match self.state.kimi.buffer.find(SECTION_BEGIN) {
                    Some(begin) => {
                        let before: String = self.state.kimi.buffer.drain(..begin).collect();
                        self.push_text(&before, events);
                        self.state.kimi.section_open = true;
                    }
                    None => {
                        let buffer = &self.state.kimi.buffer;
                        let ready = buffer.len() - kimi::partial_sentinel_len(buffer, SECTION_BEGIN);
                        let plain: String = self.state.kimi.buffer.drain(..ready).collect();
                        self.push_text(&plain, events);
                        return Ok(());
                    }
                }
            }

            self.state.kimi.check_ceiling()?;

            let Some(end) = self.state.kimi.buffer[SECTION_BEGIN.len()..].find(SECTION_END) else {
                return Ok(());
            };
            let body_end = SECTION_BEGIN.len() + end;
            let section: String = self
                .state
                .kimi
                .buffer
                .drain(..body_end + SECTION_END.len())
                .collect();
            self.state.kimi.section_open = false;

            let calls = kimi::parse_section_body(&section[SECTION_BEGIN.len()..body_end])?;
            for call in calls {
                self.open_tool(call.id, call.function.name, events);
                self.push_arguments(&call.function.arguments, events);
                self.close_block(events);
            }
        }
    }
}

/// Convert a backend SSE byte stream into Anthropic SSE frames.
///
/// Runs until `[DONE]`, end of input, or the first error frame. Dropping the
/// returned stream drops `upstream` with it.
pub fn translate_stream<S, B, E>(
    upstream: S,
    mut translator: StreamTranslator,
) -> impl Stream<Item = String>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    stream! {
        let mut events = Box::pin(upstream.eventsource());

        while let Some(event) = events.next().await {
            let payload = match event {
                Ok(event) => sse_data(&event),
                Err(e) => {
                    for event in translator.fail(TranslateError::UpstreamStream(e.to_string())) {
                        yield event.to_sse();
                    }
                    break;
                }
            };

            if let Some(payload) = payload {
                for event in translator.on_payload(payload) {
                    yield event.to_sse();
                }
                if translator.is_finished() {
                    break;
                }
            }
        }

        for event in translator.finish() {
            yield event.to_sse();
        }
    }
}

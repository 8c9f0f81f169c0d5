//! Server-Sent Events framing.
//!
//! Backends stream `data: {json}` frames separated by blank lines and end with
//! `data: [DONE]`. Frame parsing is done by `eventsource-stream`; this module
//! classifies the decoded events and formats the client-facing frames.

use eventsource_stream::Event;
use serde_json::Value;

/// One decoded backend payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseData {
    Json(String),
    Done,
}

/// Classify a backend event. Events without data are skipped.
pub fn sse_data(event: &Event) -> Option<SseData> {
    let data = event.data.trim();
    if data.is_empty() {
        None
    } else if data == "[DONE]" {
        Some(SseData::Done)
    } else {
        Some(SseData::Json(event.data.clone()))
    }
}

/// Format a client-facing frame:
///
/// ```text
/// event: <name>
/// data: <json>
///
/// ```
pub fn sse_event(event: &str, data: &Value) -> String {
    format!("event: {}\ndata: {}\n\n", event, data)
}

//! Provider payload normalization.
//!
//! Given one event's `data`, produce either incremental display text or
//! the end-of-stream signal. Model providers wrap deltas in several
//! envelope shapes; the matchers here are tried in order and the raw
//! payload is the final fallback, so content is never silently lost.

use gloss_types::{SseEvent, StreamError};
use serde_json::Value;

/// End-of-stream sentinel, matched case-sensitively against the raw data.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Event name carrying a server-side failure; its data is the message.
const ERROR_EVENT: &str = "error";

/// Outcome of normalizing one event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Incremental display text; may be empty for metadata-only frames.
    Chunk(String),
    /// The stream is complete; stop pulling events.
    Done,
}

/// Delta envelope matchers, tried in order; the first extracted text wins.
const MATCHERS: &[fn(&Value) -> Option<String>] =
    &[plain_delta_text, enveloped_delta_text, nested_message_text];

/// Normalize one event's payload.
///
/// An `error` event aborts the lookup with the frame's data as the
/// message. The sentinel signals completion. Everything else is matched
/// against the known delta shapes; a payload that matches none of them
/// is passed through as literal text, except that a recognized delta
/// envelope with nothing extractable (finish markers, usage stats) is an
/// empty chunk — provider metadata never leaks into the display text.
pub fn normalize_payload(event: &SseEvent) -> Result<Payload, StreamError> {
    if event.event == ERROR_EVENT {
        return Err(StreamError::Protocol(event.data.clone()));
    }
    if event.data == DONE_SENTINEL {
        return Ok(Payload::Done);
    }

    let Ok(json) = serde_json::from_str::<Value>(&event.data) else {
        return Ok(Payload::Chunk(event.data.clone()));
    };
    for matcher in MATCHERS {
        if let Some(text) = matcher(&json) {
            return Ok(Payload::Chunk(text));
        }
    }
    if delta_of(&json).is_some() {
        return Ok(Payload::Chunk(String::new()));
    }
    Ok(Payload::Chunk(event.data.clone()))
}

/// The delta object of the first choice, wherever the provider put it.
fn delta_of(json: &Value) -> Option<&Value> {
    json.get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
        .or_else(|| json.get("delta"))
}

/// Shape 1: `delta.content` is a plain string.
fn plain_delta_text(json: &Value) -> Option<String> {
    delta_of(json)?.get("content")?.as_str().map(str::to_string)
}

/// Shape 2: `delta.content` is a typed envelope with a `text` field.
fn enveloped_delta_text(json: &Value) -> Option<String> {
    delta_of(json)?
        .get("content")?
        .get("text")?
        .as_str()
        .map(str::to_string)
}

/// Shape 3: `delta.message.content` is a nested tree of fragments.
fn nested_message_text(json: &Value) -> Option<String> {
    let content = delta_of(json)?.get("message")?.get("content")?;
    let items = content.as_array()?;
    let mut out = String::new();
    for item in items {
        collect_text(item, &mut out);
    }
    Some(out)
}

/// Recursively collect text fragments in array order, no separator.
fn collect_text(node: &Value, out: &mut String) {
    match node {
        Value::String(s) => out.push_str(s),
        Value::Array(items) => {
            for item in items {
                collect_text(item, out);
            }
        }
        Value::Object(map) => {
            if let Some(Value::String(text)) = map.get("text") {
                out.push_str(text);
            } else if let Some(content) = map.get("content") {
                collect_text(content, out);
            } else if let Some(segments) = map.get("segments") {
                collect_text(segments, out);
            } else if let Some(messages) = map.get("messages") {
                collect_text(messages, out);
            }
        }
        _ => {}
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

//! Best-effort live preview extraction from a partially received
//! payload.
//!
//! While a definition stream is in flight the accumulated buffer is
//! usually an incomplete JSON document. The extraction here never fails
//! the stream: when nothing usable can be read yet, the caller simply
//! keeps the previous preview and tries again on the next chunk.

use serde_json::Value;

/// Extract displayable markdown from the accumulated buffer.
///
/// Complete JSON wins; a partial JSON object is scanned for a
/// (possibly unterminated) `markdown` string; a buffer that is not JSON
/// at all is already the markdown.
#[must_use]
pub fn extract_markdown(buffer: &str) -> Option<String> {
    if buffer.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(buffer) {
        return match value {
            Value::Object(map) => map
                .get("markdown")
                .and_then(Value::as_str)
                .map(str::to_string),
            Value::String(s) => Some(s),
            _ => None,
        };
    }

    let trimmed = buffer.trim_start();
    if trimmed.starts_with('{') {
        partial_string_field(trimmed, "markdown")
    } else {
        Some(buffer.to_string())
    }
}

/// Read the string value of `field` from a partial JSON object,
/// unescaping up to the last complete escape sequence.
fn partial_string_field(json: &str, field: &str) -> Option<String> {
    let needle = format!("\"{field}\"");
    let after_key = &json[json.find(&needle)? + needle.len()..];
    let after_colon = &after_key[after_key.find(':')? + 1..];
    let value = after_colon.trim_start().strip_prefix('"')?;

    let mut out = String::new();
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(out),
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('u') => {
                    let hex: String = chars.by_ref().take(4).collect();
                    if hex.len() < 4 {
                        // Escape split mid-stream; show what we have.
                        return Some(out);
                    }
                    match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                        Some(decoded) => out.push(decoded),
                        None => return Some(out),
                    }
                }
                Some(other) => out.push(other),
                // Trailing backslash: the escape will complete later.
                None => return Some(out),
            },
            _ => out.push(c),
        }
    }
    // Unterminated value: the preview is everything received so far.
    Some(out)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

//! SSE frame decoding.
//!
//! Turns a raw byte stream into discrete [`SseEvent`]s. Framing only —
//! payload semantics (JSON, sentinels) belong to [`crate::delta`].
//!
//! Two layers: [`FrameAssembler`] is a synchronous incremental parser
//! driven chunk-by-chunk, and [`decode_sse`] adapts it over any async
//! byte source. The split keeps the parsing state machine testable
//! without a runtime.

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use gloss_types::{DEFAULT_EVENT_NAME, SseEvent, StreamError};

/// Incremental SSE parser.
///
/// Push raw byte chunks in arrival order; complete frames come back as
/// events. Chunk boundaries may fall anywhere: mid-line, between the CR
/// and LF of a CRLF pair, or inside a multi-byte UTF-8 sequence — the
/// assembler buffers whatever is incomplete until the next push.
///
/// Framing rules:
/// - `\r\n` and lone `\r` are normalized to `\n` before splitting.
/// - Frames are separated by a blank line.
/// - `event:` sets the event name, last write wins.
/// - `data:` appends to the frame's data, joined with `\n`.
/// - A line without a colon continues the previous `data` field (raw
///   line with a leading `\n`), never the event name.
/// - Other fields (`id:`, `retry:`, comments) are ignored.
/// - A frame with empty data and the default event name is discarded;
///   this filters keep-alive blank frames.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    /// Undecoded tail of a UTF-8 sequence split across pushes.
    partial_utf8: Vec<u8>,
    /// Set when the previous push ended in a bare CR.
    pending_cr: bool,
    /// Normalized text not yet consumed by line splitting.
    buf: String,
    /// Event name of the frame being assembled.
    event: Option<String>,
    /// Data accumulated for the frame being assembled.
    data: Option<String>,
}

impl FrameAssembler {
    /// Create an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes; returns the events completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, StreamError> {
        self.partial_utf8.extend_from_slice(chunk);
        let bytes = std::mem::take(&mut self.partial_utf8);

        let valid_len = match std::str::from_utf8(&bytes) {
            Ok(_) => bytes.len(),
            // An incomplete sequence at the end waits for the next push;
            // anything else is genuinely malformed.
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => return Err(StreamError::Utf8(e)),
        };
        let (head, tail) = bytes.split_at(valid_len);
        let text = std::str::from_utf8(head).map_err(StreamError::Utf8)?;
        self.partial_utf8 = tail.to_vec();

        self.append_normalized(text);
        Ok(self.drain_lines())
    }

    /// Signal end of stream; flushes any unterminated trailing frame.
    pub fn finish(mut self) -> Result<Vec<SseEvent>, StreamError> {
        if !self.partial_utf8.is_empty()
            && let Err(e) = std::str::from_utf8(&self.partial_utf8)
        {
            // The source ended mid-sequence; nothing can complete it now.
            return Err(StreamError::Utf8(e));
        }
        if self.pending_cr {
            self.pending_cr = false;
            self.buf.push('\n');
        }

        let mut events = self.drain_lines();
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            if let Some(event) = self.take_line(&rest) {
                events.push(event);
            }
        }
        if let Some(event) = self.dispatch() {
            events.push(event);
        }
        Ok(events)
    }

    /// Append `text` to the line buffer with CR/CRLF folded to `\n`.
    ///
    /// A trailing CR is held back: the next push decides whether it was
    /// half of a CRLF pair or a lone terminator.
    fn append_normalized(&mut self, mut text: &str) {
        if text.is_empty() {
            // Keep a held CR pending: an empty read must not decide
            // CRLF vs lone CR.
            return;
        }
        if self.pending_cr {
            self.pending_cr = false;
            self.buf.push('\n');
            if let Some(stripped) = text.strip_prefix('\n') {
                text = stripped;
            }
        }
        if let Some(stripped) = text.strip_suffix('\r') {
            self.pending_cr = true;
            text = stripped;
        }
        if text.contains('\r') {
            self.buf.push_str(&text.replace("\r\n", "\n").replace('\r', "\n"));
        } else {
            self.buf.push_str(text);
        }
    }

    /// Consume every complete line in the buffer.
    fn drain_lines(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        while let Some(pos) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=pos).collect();
            if let Some(event) = self.take_line(&line[..line.len() - 1]) {
                events.push(event);
            }
        }
        events
    }

    /// Process one line; a blank line dispatches the assembled frame.
    fn take_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if let Some(name) = field_value(line, "event") {
            self.event = Some(name.to_string());
        } else if let Some(value) = field_value(line, "data") {
            match &mut self.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            }
        } else if !line.contains(':') {
            // Continuation of the data field, raw.
            let data = self.data.get_or_insert_with(String::new);
            data.push('\n');
            data.push_str(line);
        }
        // Any other field (comments, id:, retry:) is ignored.
        None
    }

    /// Emit the assembled frame, if it is worth emitting.
    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self
            .event
            .take()
            .unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string());
        let data = self.data.take().unwrap_or_default();
        if data.is_empty() && event == DEFAULT_EVENT_NAME {
            return None;
        }
        Some(SseEvent { event, data })
    }
}

/// Extract the value of `field: value`, tolerating a missing space.
fn field_value<'a>(line: &'a str, field: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(field)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Decode an async byte source into a lazy stream of [`SseEvent`]s.
///
/// The returned stream is non-restartable and owns `source`, so the
/// underlying reader is dropped on every exit path — completion, error,
/// or the consumer stopping early. Transport read errors terminate the
/// stream after being yielded.
pub fn decode_sse<S, B, E>(source: S) -> impl Stream<Item = Result<SseEvent, StreamError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<StreamError> + Send + 'static,
{
    try_stream! {
        let mut assembler = FrameAssembler::new();
        let mut source = std::pin::pin!(source);
        while let Some(chunk) = source.next().await {
            let chunk = chunk.map_err(Into::into)?;
            for event in assembler.push(chunk.as_ref())? {
                tracing::trace!(event = %event.event, len = event.data.len(), "sse event");
                yield event;
            }
        }
        for event in assembler.finish()? {
            yield event;
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

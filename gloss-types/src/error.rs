//! Error types for all gloss crates.

/// Errors from the transport layer beneath the event stream.
///
/// Retry and timeout policy belong to the transport implementation; this
/// core propagates its failures unchanged.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Network-level failure (connection reset, DNS failure, etc.).
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The server answered with a non-success status before streaming.
    #[error("unexpected status: {0}")]
    Status(u16),
    /// The transport was closed before or during the stream.
    #[error("transport closed: {0}")]
    Closed(String),
}

/// Errors from decoding and normalizing the event stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Read failure on the underlying source.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// The byte stream was not valid UTF-8.
    #[error("invalid UTF-8 in stream: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    /// The server sent an explicit `error` frame; the message is the
    /// frame's data.
    #[error("{0}")]
    Protocol(String),
}

impl StreamError {
    /// Whether this is an explicit server-side `error` frame as opposed
    /// to a transport/decode failure.
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

/// Errors surfaced from a lookup request.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// Opening the stream failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// Decoding or normalizing the stream failed.
    #[error(transparent)]
    Stream(#[from] StreamError),
}

impl LookupError {
    /// User-facing message for dismissible display.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Stream(StreamError::Protocol(msg)) => msg.clone(),
            other => other.to_string(),
        }
    }
}

//! The transport seam beneath the lookup pipeline.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use gloss_types::{LookupIntent, TransportError};

/// Byte-chunk stream handed back by a transport.
///
/// Content is assumed to be `text/event-stream`-shaped regardless of
/// what the server declared.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Opens definition streams.
///
/// HTTP, authentication, retries, and timeouts all live behind this
/// seam; the pipeline only consumes the returned byte stream and drops
/// it when done or cancelled.
#[async_trait]
pub trait LookupTransport: Send + Sync {
    /// Open one definition stream for `intent`.
    ///
    /// `intent.force_new` asks the backend to generate a fresh answer
    /// rather than serve one it already produced.
    async fn open_stream(&self, intent: &LookupIntent) -> Result<ByteStream, TransportError>;
}

#![deny(missing_docs)]
//! Lookup orchestration for gloss.
//!
//! This crate drives the whole pipeline: it checks the versioned cache,
//! opens definition streams through a [`LookupTransport`], feeds the
//! bytes through the SSE decoder and payload normalizer, maintains a
//! live preview while a stream is in flight, and reconciles completed
//! streams back into the cache.

pub mod config;
pub mod preview;
pub mod session;
pub mod transport;

pub use config::LookupConfig;
pub use session::{LookupSession, LookupView};
pub use transport::{ByteStream, LookupTransport};

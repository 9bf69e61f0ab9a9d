#![deny(missing_docs)]
//! Streaming layer for gloss: SSE frame decoding and payload
//! normalization.
//!
//! [`decode_sse`] turns a raw byte stream into discrete [`SseEvent`]s
//! with no knowledge of what the data means; [`normalize_payload`] turns
//! one event's data into display text or a completion signal. The two are
//! composed by the lookup orchestrator.
//!
//! [`SseEvent`]: gloss_types::SseEvent

pub mod delta;
pub mod sse;

pub use delta::{DONE_SENTINEL, Payload, normalize_payload};
pub use sse::{FrameAssembler, decode_sse};

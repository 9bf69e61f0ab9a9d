//! Data types shared by the stream, cache, and lookup layers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default SSE event name, per the `text/event-stream` framing rules.
pub const DEFAULT_EVENT_NAME: &str = "message";

/// One decoded server-sent event.
///
/// Ephemeral: produced by the frame decoder and consumed by the payload
/// normalizer within a single decode pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name; `"message"` when the frame carried no `event:` field.
    pub event: String,
    /// Raw data payload; multi-line `data:` fields are joined with `\n`.
    pub data: String,
}

impl SseEvent {
    /// Create an event with an explicit name.
    #[must_use]
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }

    /// Create a default-named (`"message"`) event.
    #[must_use]
    pub fn message(data: impl Into<String>) -> Self {
        Self::new(DEFAULT_EVENT_NAME, data)
    }
}

/// One generated dictionary answer for a fingerprint.
///
/// Immutable once stored: regeneration produces a new `id`, it never
/// mutates an existing version. Fields the backend sends beyond the known
/// ones are preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    /// Canonical identifier; always present after normalization.
    pub id: String,
    /// The looked-up term this answer belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    /// Rendered definition body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    /// Generation flavor (e.g. concise vs. exhaustive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
    /// Definition language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Arbitrary additional entry fields, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Version {
    /// Create a version with just an id; remaining fields empty.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            term: None,
            markdown: None,
            flavor: None,
            language: None,
            extra: Map::new(),
        }
    }
}

/// All generated versions for one fingerprint, plus selection state.
///
/// Invariants (enforced by the store, never repaired reactively):
/// a record is removed rather than kept with zero versions, and a
/// non-`None` `active_version_id` always names a member of `versions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Versions in insertion order; insertion order is recency order.
    pub versions: Vec<Version>,
    /// Id of the version currently selected for display.
    pub active_version_id: Option<String>,
    /// Record-level metadata, merged last-write-wins per key.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl VersionRecord {
    /// The currently active version, if one is selected.
    #[must_use]
    pub fn active_version(&self) -> Option<&Version> {
        let id = self.active_version_id.as_deref()?;
        self.versions.iter().find(|v| v.id == id)
    }
}

/// Description of one lookup request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupIntent {
    /// The term to look up. Case/whitespace normalization happens before
    /// this struct is built.
    pub term: String,
    /// Language the term is written in.
    pub source_language: String,
    /// Language the definition should be generated in; part of the
    /// fingerprint.
    pub target_language: String,
    /// Generation flavor, if the caller wants a specific one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
    /// Bypass the cache and always open a new stream.
    #[serde(default)]
    pub force_new: bool,
    /// Version the caller wants shown on a cache hit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_version_id: Option<String>,
}

/// Direction for stepping through a record's versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards older versions.
    Prev,
    /// Towards newer versions.
    Next,
}

/// Cache key identifying one dictionary-lookup subject.
///
/// Pure concatenation; callers normalize `term` beforehand.
#[must_use]
pub fn fingerprint(term: &str, language: &str) -> String {
    format!("{term}::{language}")
}

//! The lookup state machine.
//!
//! One [`LookupSession`] serves one rendering surface. It decides per
//! request whether to present a cached version, open a fresh stream, or
//! refresh in the background, and it reconciles completed streams into
//! the shared [`VersionStore`].
//!
//! Visibility follows a last-request-wins rule: every request takes a
//! monotonically increasing ticket, and only the holder of the newest
//! ticket may touch the view. Superseded requests still run to
//! completion and write the cache — they just do it silently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::StreamExt;
use gloss_cache::{SetVersionsOptions, VersionStore, registry};
use gloss_stream::{Payload, decode_sse, normalize_payload};
use gloss_types::{Direction, LookupError, LookupIntent, Version, fingerprint};
use serde_json::{Map, Value};

use crate::config::LookupConfig;
use crate::preview;
use crate::transport::LookupTransport;

/// What the rendering layer sees.
#[derive(Debug, Clone, Default)]
pub struct LookupView {
    /// The version currently presented, or the in-flight live preview.
    pub entry: Option<Version>,
    /// True only while a cold lookup streams; never during a refresh.
    pub loading: bool,
    /// True while a background refresh streams behind a visible entry.
    pub is_refreshing: bool,
    /// Dismissible error message from the last failed request.
    pub error: Option<String>,
    /// All versions of the presented record, insertion order.
    pub versions: Vec<Version>,
    /// Id of the version the record considers active.
    pub active_version_id: Option<String>,
}

/// How a stream presents while in flight.
enum StreamMode {
    /// Nothing is on screen for this subject; assert `loading` and show
    /// the live preview as it grows.
    Cold,
    /// A version is already visible; keep it, assert `is_refreshing`,
    /// and only switch on completion.
    Refresh,
}

/// Orchestrates lookups for one rendering surface.
pub struct LookupSession {
    transport: Arc<dyn LookupTransport>,
    store: Arc<VersionStore>,
    config: LookupConfig,
    view: RwLock<LookupView>,
    current: RwLock<Option<LookupIntent>>,
    ticket: AtomicU64,
}

impl LookupSession {
    /// Create a session over a transport and a (possibly shared) store.
    #[must_use]
    pub fn new(
        transport: Arc<dyn LookupTransport>,
        store: Arc<VersionStore>,
        config: LookupConfig,
    ) -> Self {
        Self {
            transport,
            store,
            config,
            view: RwLock::new(LookupView::default()),
            current: RwLock::new(None),
            ticket: AtomicU64::new(0),
        }
    }

    /// Snapshot of the current view state.
    #[must_use]
    pub fn view(&self) -> LookupView {
        self.read_view().clone()
    }

    /// The store this session reconciles into.
    #[must_use]
    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    /// Look up `term` with the session defaults.
    ///
    /// Surrounding whitespace is trimmed before fingerprinting; further
    /// case normalization is the caller's responsibility.
    pub async fn search(&self, term: &str) -> Result<(), LookupError> {
        let intent = LookupIntent {
            term: term.trim().to_string(),
            source_language: self.config.source_language.clone(),
            target_language: self.config.target_language.clone(),
            flavor: self.config.flavor.clone(),
            force_new: false,
            preferred_version_id: None,
        };
        self.search_with(intent).await
    }

    /// Look up with a fully specified intent.
    ///
    /// Cache hit: the active (or explicitly preferred) version is
    /// presented immediately, `loading` stays false, and no stream is
    /// opened. Otherwise a stream is driven to completion and its
    /// result reconciled into the store.
    pub async fn search_with(&self, intent: LookupIntent) -> Result<(), LookupError> {
        let key = fingerprint(&intent.term, &intent.target_language);
        let prior_key = self
            .current_intent()
            .map(|i| fingerprint(&i.term, &i.target_language));
        *self.write_current() = Some(intent.clone());
        let ticket = self.next_ticket();

        if !intent.force_new
            && let Some(record) = self.store.get_record(&key).await
        {
            let entry =
                registry::select_version(&record, intent.preferred_version_id.as_deref()).cloned();
            let active_version_id = entry
                .as_ref()
                .map(|v| v.id.clone())
                .or_else(|| record.active_version_id.clone());
            {
                let mut view = self.write_view();
                view.entry = entry;
                view.loading = false;
                view.is_refreshing = false;
                view.error = None;
                view.active_version_id = active_version_id;
                view.versions = record.versions;
            }
            tracing::debug!(term = %intent.term, key = %key, "cache hit");
            return Ok(());
        }

        // Forcing a new answer for the subject already on screen is a
        // refresh; everything else starts cold.
        let same_subject =
            prior_key.as_deref() == Some(key.as_str()) && self.read_view().entry.is_some();
        let mode = if same_subject {
            StreamMode::Refresh
        } else {
            StreamMode::Cold
        };
        self.stream_lookup(ticket, &key, &intent, mode).await
    }

    /// Regenerate the current term: force a new stream while the stale
    /// version stays visible.
    pub async fn reoutput(&self) -> Result<(), LookupError> {
        let Some(mut intent) = self.current_intent() else {
            return Ok(());
        };
        intent.force_new = true;
        intent.preferred_version_id = None;
        self.search_with(intent).await
    }

    /// Step the active version of the current record; saturates at the
    /// ends.
    pub async fn navigate_version(&self, direction: Direction) {
        let Some(intent) = self.current_intent() else {
            return;
        };
        let key = fingerprint(&intent.term, &intent.target_language);
        let Some(record) = self.store.get_record(&key).await else {
            return;
        };

        let last = record.versions.len().saturating_sub(1);
        let position = record
            .active_version_id
            .as_deref()
            .and_then(|id| record.versions.iter().position(|v| v.id == id))
            .unwrap_or(last);
        let target = match direction {
            Direction::Prev => position.saturating_sub(1),
            Direction::Next => (position + 1).min(last),
        };
        let Some(version) = record.versions.get(target) else {
            return;
        };
        self.store
            .set_active_version(&key, &Value::String(version.id.clone()))
            .await;

        if let Some(record) = self.store.get_record(&key).await {
            let entry = record.active_version().cloned();
            let mut view = self.write_view();
            view.entry = entry;
            view.active_version_id = record.active_version_id.clone();
            view.versions = record.versions;
        }
    }

    /// Clear a surfaced error message.
    pub fn dismiss_error(&self) {
        self.write_view().error = None;
    }

    // ─── Internals ───────────────────────────────────────────────────────────

    async fn stream_lookup(
        &self,
        ticket: u64,
        key: &str,
        intent: &LookupIntent,
        mode: StreamMode,
    ) -> Result<(), LookupError> {
        {
            let mut view = self.write_view();
            view.error = None;
            match mode {
                StreamMode::Refresh => view.is_refreshing = true,
                StreamMode::Cold => {
                    // A previously rendered different term must not
                    // linger once the new stream starts.
                    view.loading = true;
                    view.entry = None;
                    view.versions = Vec::new();
                    view.active_version_id = None;
                }
            }
        }
        tracing::debug!(
            term = %intent.term,
            language = %intent.target_language,
            force_new = intent.force_new,
            "opening definition stream"
        );

        let generated_id = uuid::Uuid::new_v4().to_string();
        match self.drive_stream(ticket, intent, &generated_id, &mode).await {
            Ok(buffer) => {
                self.commit(ticket, key, intent, &generated_id, &buffer)
                    .await;
                Ok(())
            }
            Err(err) => {
                // The cache is left untouched; no partial version is
                // ever committed.
                if self.is_latest(ticket) {
                    let mut view = self.write_view();
                    view.loading = false;
                    view.is_refreshing = false;
                    view.error = Some(err.user_message());
                }
                tracing::warn!(term = %intent.term, error = %err, "lookup failed");
                Err(err)
            }
        }
    }

    /// Pull the stream to completion, accumulating display text.
    ///
    /// Chunks are processed strictly in arrival order; the buffer only
    /// ever grows until completion or abort.
    async fn drive_stream(
        &self,
        ticket: u64,
        intent: &LookupIntent,
        generated_id: &str,
        mode: &StreamMode,
    ) -> Result<String, LookupError> {
        let source = self.transport.open_stream(intent).await?;
        let mut events = std::pin::pin!(decode_sse(source));
        let mut buffer = String::new();

        while let Some(event) = events.next().await {
            let event = event?;
            match normalize_payload(&event)? {
                Payload::Done => break,
                Payload::Chunk(text) => {
                    if text.is_empty() {
                        continue;
                    }
                    buffer.push_str(&text);
                    tracing::trace!(
                        term = %intent.term,
                        language = %intent.target_language,
                        len = text.len(),
                        total = buffer.len(),
                        "definition chunk"
                    );
                    // Live preview for cold lookups only: a refresh
                    // keeps the last-known version on screen until the
                    // new one is complete.
                    if matches!(mode, StreamMode::Cold)
                        && self.is_latest(ticket)
                        && let Some(markdown) = preview::extract_markdown(&buffer)
                    {
                        let mut view = self.write_view();
                        view.entry = Some(draft_version(intent, generated_id, markdown));
                    }
                }
            }
        }
        Ok(buffer)
    }

    /// Reconcile a completed stream into the store, and into the view
    /// when this request is still the foreground one.
    async fn commit(
        &self,
        ticket: u64,
        key: &str,
        intent: &LookupIntent,
        generated_id: &str,
        buffer: &str,
    ) {
        let (value, version_id) = final_version_value(intent, generated_id, buffer);
        let foreground = self.is_latest(ticket);

        let mut metadata = Map::new();
        metadata.insert(
            "source_language".into(),
            Value::String(intent.source_language.clone()),
        );
        if let Some(flavor) = &intent.flavor {
            metadata.insert("flavor".into(), Value::String(flavor.clone()));
        }
        let options = SetVersionsOptions {
            // A superseded request enriches the cache without stealing
            // the visible selection.
            active_version_id: foreground.then(|| Value::String(version_id.clone())),
            metadata: Some(metadata),
        };
        self.store
            .set_versions(key, std::slice::from_ref(&value), options)
            .await;

        if foreground && let Some(record) = self.store.get_record(key).await {
            let entry = registry::select_version(&record, Some(&version_id)).cloned();
            let mut view = self.write_view();
            view.entry = entry;
            view.loading = false;
            view.is_refreshing = false;
            view.error = None;
            view.active_version_id = record.active_version_id.clone();
            view.versions = record.versions;
        }
        tracing::debug!(
            term = %intent.term,
            version = %version_id,
            foreground,
            "lookup complete"
        );
    }

    fn next_ticket(&self) -> u64 {
        self.ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_latest(&self, ticket: u64) -> bool {
        self.ticket.load(Ordering::SeqCst) == ticket
    }

    fn current_intent(&self) -> Option<LookupIntent> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write_current(&self) -> RwLockWriteGuard<'_, Option<LookupIntent>> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_view(&self) -> RwLockReadGuard<'_, LookupView> {
        self.view.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_view(&self) -> RwLockWriteGuard<'_, LookupView> {
        self.view.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The transient version shown while a cold stream is in flight.
fn draft_version(intent: &LookupIntent, id: &str, markdown: String) -> Version {
    Version {
        id: id.to_string(),
        term: Some(intent.term.clone()),
        markdown: Some(markdown),
        flavor: intent.flavor.clone(),
        language: Some(intent.target_language.clone()),
        extra: Map::new(),
    }
}

/// Build the version value to store from the accumulated buffer.
///
/// A JSON-object payload is taken as the entry itself; anything else
/// becomes its `markdown` body. The payload's own id wins when it
/// normalizes; otherwise the pre-minted generation id is used.
fn final_version_value(
    intent: &LookupIntent,
    generated_id: &str,
    buffer: &str,
) -> (Value, String) {
    let mut obj = match serde_json::from_str::<Value>(buffer) {
        Ok(Value::Object(map)) => map,
        _ => {
            let mut map = Map::new();
            map.insert("markdown".into(), Value::String(buffer.to_string()));
            map
        }
    };

    let version_id = match obj.get("id").and_then(registry::normalize_id) {
        Some(id) => id,
        None => {
            obj.insert("id".into(), Value::String(generated_id.to_string()));
            generated_id.to_string()
        }
    };
    obj.entry("term")
        .or_insert_with(|| Value::String(intent.term.clone()));
    obj.entry("language")
        .or_insert_with(|| Value::String(intent.target_language.clone()));
    if let Some(flavor) = &intent.flavor {
        obj.entry("flavor")
            .or_insert_with(|| Value::String(flavor.clone()));
    }
    (Value::Object(obj), version_id)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(term: &str) -> LookupIntent {
        LookupIntent {
            term: term.into(),
            source_language: "AUTO".into(),
            target_language: "ENGLISH".into(),
            flavor: None,
            force_new: false,
            preferred_version_id: None,
        }
    }

    #[test]
    fn final_value_adopts_payload_id() {
        let (value, id) = final_version_value(
            &intent("hello"),
            "gen-1",
            r#"{"id":"srv-9","markdown":"**hello**"}"#,
        );
        assert_eq!(id, "srv-9");
        assert_eq!(value["id"], "srv-9");
        assert_eq!(value["term"], "hello");
        assert_eq!(value["language"], "ENGLISH");
    }

    #[test]
    fn final_value_falls_back_to_generated_id() {
        let (value, id) = final_version_value(&intent("hello"), "gen-1", r#"{"markdown":"x"}"#);
        assert_eq!(id, "gen-1");
        assert_eq!(value["id"], "gen-1");
    }

    #[test]
    fn final_value_wraps_plain_text_as_markdown() {
        let (value, id) =
            final_version_value(&intent("hello"), "gen-1", "**hello** a greeting");
        assert_eq!(id, "gen-1");
        assert_eq!(value["markdown"], "**hello** a greeting");
        assert_eq!(value["term"], "hello");
    }

    #[test]
    fn final_value_keeps_existing_fields() {
        let (value, _) = final_version_value(
            &intent("hello"),
            "gen-1",
            r#"{"markdown":"x","term":"HELLO","phonetic":"h"}"#,
        );
        // Payload fields are never overwritten by intent defaults.
        assert_eq!(value["term"], "HELLO");
        assert_eq!(value["phonetic"], "h");
    }
}

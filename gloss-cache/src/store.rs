//! Versioned cache store keyed by lookup fingerprint.
//!
//! A `HashMap` behind a `tokio::sync::RwLock`, after the pattern of a
//! single-process state store. Every mutator computes the complete next
//! record from the previous one and then performs one insert or remove
//! under the write lock, so the lock is the single writer gate:
//! concurrent upserts for different fingerprints never interfere, and
//! upserts for the same fingerprint serialize and merge instead of
//! overwriting each other.

use std::collections::HashMap;

use gloss_types::{Version, VersionRecord};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::registry;

/// Options for [`VersionStore::set_versions`].
#[derive(Debug, Clone, Default)]
pub struct SetVersionsOptions {
    /// Raw preferred active id; normalized before use. `None` keeps the
    /// sticky resolution of §`registry::resolve_active_id`.
    pub active_version_id: Option<Value>,
    /// Metadata to merge into the record, last write wins per key.
    pub metadata: Option<Map<String, Value>>,
}

/// Shared store of [`VersionRecord`]s, keyed by fingerprint.
///
/// Constructed empty at process start and cleared on logout/reset.
/// Invariant after every operation: a key either has no record, or its
/// record has at least one version and an active id that is a member of
/// the version list.
pub struct VersionStore {
    entries: RwLock<HashMap<String, VersionRecord>>,
}

impl VersionStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuild a store from persisted entries.
    ///
    /// The record invariants are re-enforced on the way in: empty
    /// records are dropped and foreign active ids re-resolved, so a
    /// stale or hand-edited persistence layer cannot smuggle in an
    /// invalid record.
    #[must_use]
    pub fn hydrate(entries: HashMap<String, VersionRecord>) -> Self {
        let mut map = HashMap::new();
        for (key, mut record) in entries {
            if record.versions.is_empty() {
                continue;
            }
            record.active_version_id = registry::resolve_active_id(
                &record.versions,
                record.active_version_id.as_deref(),
                None,
            );
            map.insert(key, record);
        }
        Self {
            entries: RwLock::new(map),
        }
    }

    /// Upsert versions for a key.
    ///
    /// `versions` is normalized first; an empty normalized list is
    /// equivalent to removing the record entirely — an empty-version
    /// record is never stored. Otherwise the incoming versions merge
    /// with any existing record, metadata merges last-write-wins, the
    /// active id is re-resolved, and the record is replaced in one
    /// write.
    pub async fn set_versions(&self, key: &str, versions: &[Value], options: SetVersionsOptions) {
        let incoming = registry::normalize_versions(versions);
        let mut entries = self.entries.write().await;
        if incoming.is_empty() {
            entries.remove(key);
            return;
        }

        let existing = entries.get(key);
        let merged = match existing {
            Some(record) => registry::merge_versions(&record.versions, &incoming),
            None => incoming,
        };
        let empty = Map::new();
        let metadata = registry::merge_metadata(
            existing.map_or(&empty, |record| &record.metadata),
            options.metadata.as_ref(),
        );
        let preferred = options
            .active_version_id
            .as_ref()
            .and_then(registry::normalize_id);
        let current = existing.and_then(|record| record.active_version_id.clone());
        let active_version_id =
            registry::resolve_active_id(&merged, preferred.as_deref(), current.as_deref());

        entries.insert(
            key.to_string(),
            VersionRecord {
                versions: merged,
                active_version_id,
                metadata,
            },
        );
    }

    /// Overwrite the active version id for a key.
    ///
    /// No-op when the key has no record, when the id does not
    /// normalize, or when it names no stored version — a bad input
    /// never nulls out or corrupts the existing selection.
    pub async fn set_active_version(&self, key: &str, version_id: &Value) {
        let Some(id) = registry::normalize_id(version_id) else {
            return;
        };
        let mut entries = self.entries.write().await;
        if let Some(record) = entries.get_mut(key)
            && record.versions.iter().any(|v| v.id == id)
        {
            record.active_version_id = Some(id);
        }
    }

    /// Remove versions from a key's record.
    ///
    /// With `None`, the whole record goes. With explicit ids, the named
    /// versions are filtered out; if nothing remains the record goes
    /// too, and if the active version was among the removed ones a new
    /// active id is resolved from the survivors.
    pub async fn remove_versions(&self, key: &str, version_ids: Option<&[Value]>) {
        let mut entries = self.entries.write().await;
        let Some(ids) = version_ids else {
            entries.remove(key);
            return;
        };
        let ids: Vec<String> = ids.iter().filter_map(registry::normalize_id).collect();
        let Some(record) = entries.get(key) else {
            return;
        };

        let kept: Vec<Version> = record
            .versions
            .iter()
            .filter(|v| !ids.contains(&v.id))
            .cloned()
            .collect();
        if kept.is_empty() {
            entries.remove(key);
            return;
        }
        let active_version_id =
            registry::resolve_active_id(&kept, None, record.active_version_id.as_deref());
        let metadata = record.metadata.clone();
        entries.insert(
            key.to_string(),
            VersionRecord {
                versions: kept,
                active_version_id,
                metadata,
            },
        );
    }

    /// Read one version: the explicitly requested one, else the active.
    pub async fn get_entry(&self, key: &str, version_id: Option<&str>) -> Option<Version> {
        let entries = self.entries.read().await;
        let record = entries.get(key)?;
        registry::select_version(record, version_id).cloned()
    }

    /// Read a key's full record.
    pub async fn get_record(&self, key: &str) -> Option<VersionRecord> {
        self.entries.read().await.get(key).cloned()
    }

    /// Wipe the entire store (logout/reset).
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Export the entries map for persistence.
    ///
    /// Only durable record state is exported; transient lookup flags
    /// never live in the store.
    pub async fn snapshot(&self) -> HashMap<String, VersionRecord> {
        self.entries.read().await.clone()
    }
}

impl Default for VersionStore {
    fn default() -> Self {
        Self::new()
    }
}

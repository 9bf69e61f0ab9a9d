//! Pure version-collection arithmetic.
//!
//! Everything here is side-effect-free; [`crate::store::VersionStore`]
//! composes these into atomic record updates.

use gloss_types::{Version, VersionRecord};
use serde_json::{Map, Value};

/// Coerce a raw identifier to its canonical string form.
///
/// Strings pass through (empty is not an id), numbers stringify,
/// everything else has no derivable id. No synthetic ids are invented
/// here.
#[must_use]
pub fn normalize_id(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Map raw version-like values to canonical [`Version`]s.
///
/// Input order is preserved; entries without a derivable id are dropped.
/// Duplicate ids are left alone — deduplication is the merge step's job.
#[must_use]
pub fn normalize_versions(raw: &[Value]) -> Vec<Version> {
    raw.iter().filter_map(normalize_version).collect()
}

/// Normalize one version-like value, or drop it.
fn normalize_version(raw: &Value) -> Option<Version> {
    let obj = raw.as_object()?;
    let id = normalize_id(obj.get("id")?)?;

    let mut extra = obj.clone();
    extra.remove("id");
    let term = string_field(&mut extra, "term");
    let markdown = string_field(&mut extra, "markdown");
    let flavor = string_field(&mut extra, "flavor");
    let language = string_field(&mut extra, "language");

    Some(Version {
        id,
        term,
        markdown,
        flavor,
        language,
        extra,
    })
}

/// Pull `key` out of `map` if it is a string; non-string values stay put.
fn string_field(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key)? {
        Value::String(s) => Some(s),
        other => {
            map.insert(key.to_string(), other);
            None
        }
    }
}

/// Merge two version collections without duplicating ids.
///
/// Every id from `existing` keeps its position, updated in place when
/// `incoming` carries the same id (incoming wins); ids only in
/// `incoming` are appended in their order.
#[must_use]
pub fn merge_versions(existing: &[Version], incoming: &[Version]) -> Vec<Version> {
    let mut merged = existing.to_vec();
    for version in incoming {
        match merged.iter_mut().find(|v| v.id == version.id) {
            Some(slot) => *slot = version.clone(),
            None => merged.push(version.clone()),
        }
    }
    merged
}

/// Shallow-merge metadata; incoming keys overwrite existing ones.
#[must_use]
pub fn merge_metadata(
    existing: &Map<String, Value>,
    incoming: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    let Some(incoming) = incoming else {
        return existing.clone();
    };
    let mut merged = existing.clone();
    for (key, value) in incoming {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Decide which version should be active.
///
/// Order: a `preferred` id present in `versions`; else a `current` id
/// still present (sticky — never silently jump versions under the user);
/// else the most recently appended; else `None`. The result is always a
/// member of `versions` or `None`.
#[must_use]
pub fn resolve_active_id(
    versions: &[Version],
    preferred: Option<&str>,
    current: Option<&str>,
) -> Option<String> {
    let member = |id: &str| versions.iter().any(|v| v.id == id);
    if let Some(id) = preferred
        && member(id)
    {
        return Some(id.to_string());
    }
    if let Some(id) = current
        && member(id)
    {
        return Some(id.to_string());
    }
    versions.last().map(|v| v.id.clone())
}

/// Select a version for display: the explicitly requested one if
/// present, else the record's active version.
#[must_use]
pub fn select_version<'a>(
    record: &'a VersionRecord,
    version_id: Option<&str>,
) -> Option<&'a Version> {
    if let Some(id) = version_id
        && let Some(version) = record.versions.iter().find(|v| v.id == id)
    {
        return Some(version);
    }
    record.active_version()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

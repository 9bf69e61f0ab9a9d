//! Integration tests for the versioned cache store.

use std::sync::Arc;

use gloss_cache::{SetVersionsOptions, VersionStore};
use gloss_types::fingerprint;
use serde_json::{Value, json};

fn version(id: &str) -> Value {
    json!({"id": id, "term": "hello", "markdown": format!("definition {id}")})
}

fn active_id(value: &str) -> SetVersionsOptions {
    SetVersionsOptions {
        active_version_id: Some(json!(value)),
        ..Default::default()
    }
}

#[tokio::test]
async fn set_then_get_roundtrip() {
    let store = VersionStore::new();
    let key = fingerprint("hello", "ENGLISH");

    store
        .set_versions(&key, &[version("v1")], SetVersionsOptions::default())
        .await;

    let record = store.get_record(&key).await.unwrap();
    assert_eq!(record.versions.len(), 1);
    assert_eq!(record.active_version_id.as_deref(), Some("v1"));

    let entry = store.get_entry(&key, None).await.unwrap();
    assert_eq!(entry.markdown.as_deref(), Some("definition v1"));

    let explicit = store.get_entry(&key, Some("v1")).await.unwrap();
    assert_eq!(explicit.id, "v1");
}

#[tokio::test]
async fn empty_normalized_set_removes_the_record() {
    let store = VersionStore::new();
    let key = fingerprint("hello", "ENGLISH");
    store
        .set_versions(&key, &[version("v1")], SetVersionsOptions::default())
        .await;

    // Nothing in this batch normalizes to a version.
    store
        .set_versions(&key, &[json!({"markdown": "no id"})], SetVersionsOptions::default())
        .await;
    assert!(store.get_record(&key).await.is_none());

    store
        .set_versions(&key, &[], SetVersionsOptions::default())
        .await;
    assert!(store.get_record(&key).await.is_none());
}

#[tokio::test]
async fn merge_keeps_order_updates_and_appends() {
    let store = VersionStore::new();
    let key = fingerprint("hello", "ENGLISH");
    store
        .set_versions(&key, &[version("v1"), version("v2")], SetVersionsOptions::default())
        .await;
    store
        .set_versions(
            &key,
            &[json!({"id": "v1", "markdown": "updated"}), version("v3")],
            SetVersionsOptions::default(),
        )
        .await;

    let record = store.get_record(&key).await.unwrap();
    let ids: Vec<&str> = record.versions.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec!["v1", "v2", "v3"]);
    assert_eq!(record.versions[0].markdown.as_deref(), Some("updated"));
}

#[tokio::test]
async fn active_id_is_sticky_across_merges() {
    let store = VersionStore::new();
    let key = fingerprint("hello", "ENGLISH");
    store
        .set_versions(&key, &[version("v1")], active_id("v1"))
        .await;
    // A background merge without a preference must not steal the
    // selection.
    store
        .set_versions(&key, &[version("v2")], SetVersionsOptions::default())
        .await;

    let record = store.get_record(&key).await.unwrap();
    assert_eq!(record.active_version_id.as_deref(), Some("v1"));
}

#[tokio::test]
async fn set_active_version_rejects_bad_inputs() {
    let store = VersionStore::new();
    let key = fingerprint("hello", "ENGLISH");
    store
        .set_versions(&key, &[version("v1"), version("v2")], active_id("v2"))
        .await;

    store.set_active_version(&key, &json!(null)).await;
    store.set_active_version(&key, &json!("not-stored")).await;
    store.set_active_version("missing-key", &json!("v1")).await;

    let record = store.get_record(&key).await.unwrap();
    assert_eq!(record.active_version_id.as_deref(), Some("v2"));

    store.set_active_version(&key, &json!("v1")).await;
    let record = store.get_record(&key).await.unwrap();
    assert_eq!(record.active_version_id.as_deref(), Some("v1"));
}

#[tokio::test]
async fn removing_the_active_version_re_resolves() {
    let store = VersionStore::new();
    let key = fingerprint("hello", "ENGLISH");
    store
        .set_versions(
            &key,
            &[version("v1"), version("v2"), version("v3")],
            active_id("v2"),
        )
        .await;

    store.remove_versions(&key, Some(&[json!("v2")])).await;
    let record = store.get_record(&key).await.unwrap();
    let ids: Vec<&str> = record.versions.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec!["v1", "v3"]);
    // Falls back to the most recently appended survivor.
    assert_eq!(record.active_version_id.as_deref(), Some("v3"));
}

#[tokio::test]
async fn removing_everything_removes_the_record() {
    let store = VersionStore::new();
    let key = fingerprint("hello", "ENGLISH");
    store
        .set_versions(&key, &[version("v1"), version("v2")], SetVersionsOptions::default())
        .await;

    store
        .remove_versions(&key, Some(&[json!("v1"), json!("v2")]))
        .await;
    assert!(store.get_record(&key).await.is_none());

    store
        .set_versions(&key, &[version("v1")], SetVersionsOptions::default())
        .await;
    store.remove_versions(&key, None).await;
    assert!(store.get_record(&key).await.is_none());
}

#[tokio::test]
async fn removing_a_non_active_version_keeps_selection() {
    let store = VersionStore::new();
    let key = fingerprint("hello", "ENGLISH");
    store
        .set_versions(
            &key,
            &[version("v1"), version("v2"), version("v3")],
            active_id("v1"),
        )
        .await;

    store.remove_versions(&key, Some(&[json!("v3")])).await;
    let record = store.get_record(&key).await.unwrap();
    assert_eq!(record.active_version_id.as_deref(), Some("v1"));
}

#[tokio::test]
async fn metadata_merges_last_write_wins() {
    let store = VersionStore::new();
    let key = fingerprint("hello", "ENGLISH");

    let mut first = serde_json::Map::new();
    first.insert("flavor".into(), json!("concise"));
    first.insert("model".into(), json!("m-1"));
    store
        .set_versions(
            &key,
            &[version("v1")],
            SetVersionsOptions {
                metadata: Some(first),
                ..Default::default()
            },
        )
        .await;

    let mut second = serde_json::Map::new();
    second.insert("model".into(), json!("m-2"));
    store
        .set_versions(
            &key,
            &[version("v2")],
            SetVersionsOptions {
                metadata: Some(second),
                ..Default::default()
            },
        )
        .await;

    let record = store.get_record(&key).await.unwrap();
    assert_eq!(record.metadata["flavor"], "concise");
    assert_eq!(record.metadata["model"], "m-2");
}

#[tokio::test]
async fn clear_wipes_everything() {
    let store = VersionStore::new();
    store
        .set_versions(
            &fingerprint("hello", "ENGLISH"),
            &[version("v1")],
            SetVersionsOptions::default(),
        )
        .await;
    store
        .set_versions(
            &fingerprint("world", "GERMAN"),
            &[version("v2")],
            SetVersionsOptions::default(),
        )
        .await;

    store.clear().await;
    assert!(store.snapshot().await.is_empty());
}

#[tokio::test]
async fn snapshot_hydrate_roundtrip_enforces_invariants() {
    let store = VersionStore::new();
    let key = fingerprint("hello", "ENGLISH");
    store
        .set_versions(&key, &[version("v1"), version("v2")], active_id("v1"))
        .await;

    let mut entries = store.snapshot().await;
    // Corrupt the persisted form: foreign active id and an empty record.
    if let Some(record) = entries.get_mut(&key) {
        record.active_version_id = Some("ghost".into());
    }
    entries.insert(
        "empty::KEY".into(),
        gloss_types::VersionRecord {
            versions: vec![],
            active_version_id: Some("ghost".into()),
            metadata: serde_json::Map::new(),
        },
    );

    let restored = VersionStore::hydrate(entries);
    assert!(restored.get_record("empty::KEY").await.is_none());
    let record = restored.get_record(&key).await.unwrap();
    assert_eq!(record.active_version_id.as_deref(), Some("v2"));
}

#[tokio::test]
async fn concurrent_upserts_for_one_fingerprint_merge() {
    let store = Arc::new(VersionStore::new());
    let key = fingerprint("hello", "ENGLISH");

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = Arc::clone(&store);
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            store
                .set_versions(
                    &key,
                    &[version(&format!("v{i}"))],
                    SetVersionsOptions::default(),
                )
                .await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let record = store.get_record(&key).await.unwrap();
    assert_eq!(record.versions.len(), 8);
    let active = record.active_version_id.as_deref().unwrap();
    assert!(record.versions.iter().any(|v| v.id == active));
}

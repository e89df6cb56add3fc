//! LMDB adapter behavior: durability, index maintenance, and parity with
//! the in-memory store. Every test opens its own environment in a temp dir.

use std::collections::HashSet;
use std::thread;

use chrono::{DateTime, Duration, Utc};
use scopebit::{
    AccessContext, Engine, EngineError, EntityKindDescriptor, Expiry, GrantRecord, GrantStore,
    KindRegistry, LmdbStore, MAX_PART_LEN, OperationTable, PermissionKind, PermissionSet,
    ScopeKey, Target,
};
use tempfile::TempDir;

fn open() -> (TempDir, LmdbStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = LmdbStore::open(dir.path()).unwrap();
    (dir, store)
}

fn bits(kinds: &[PermissionKind]) -> PermissionSet {
    PermissionSet::of(kinds)
}

/// Stored timestamps carry millisecond precision; align before comparing.
fn ms(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap()
}

#[test]
fn merge_roundtrips_bits_and_expiry() {
    let (_dir, store) = open();
    let key = ScopeKey::tenant("t1", "u1");
    let until = ms(Utc::now() + Duration::hours(1));

    store.merge(&key, bits(&[PermissionKind::Read]), Expiry::At(until)).unwrap();
    let rec = store.get(&key).unwrap().unwrap();
    assert_eq!(rec.bits, bits(&[PermissionKind::Read]));
    assert_eq!(rec.expires_at, Some(until));

    // A second merge unions bits; Keep leaves the stored expiry alone.
    store.merge(&key, bits(&[PermissionKind::Edit]), Expiry::Keep).unwrap();
    let rec = store.get(&key).unwrap().unwrap();
    assert_eq!(rec.bits, bits(&[PermissionKind::Read, PermissionKind::Edit]));
    assert_eq!(rec.expires_at, Some(until));

    // Never clears it.
    store.merge(&key, PermissionSet::empty(), Expiry::Never).unwrap();
    assert_eq!(store.get(&key).unwrap().unwrap().expires_at, None);
}

#[test]
fn get_many_keeps_input_order_with_gaps() {
    let (_dir, store) = open();
    let held = ScopeKey::resource("t1", "u1", "doc", "d1");
    let also = ScopeKey::global();
    store.merge(&held, bits(&[PermissionKind::Edit]), Expiry::Keep).unwrap();
    store.merge(&also, bits(&[PermissionKind::Read]), Expiry::Keep).unwrap();

    let keys = [
        held.clone(),
        ScopeKey::content_type("t1", "u1", "Document"),
        also.clone(),
        ScopeKey::tenant_default("t1"),
    ];
    let recs = store.get_many(&keys).unwrap();
    assert_eq!(recs.len(), 4);
    assert_eq!(recs[0].unwrap().bits, bits(&[PermissionKind::Edit]));
    assert!(recs[1].is_none());
    assert_eq!(recs[2].unwrap().bits, bits(&[PermissionKind::Read]));
    assert!(recs[3].is_none());
}

#[test]
fn replace_overwrites_verbatim() {
    let (_dir, store) = open();
    let key = ScopeKey::content_type("t1", "u1", "Document");
    let until = ms(Utc::now() + Duration::days(7));
    store
        .merge(&key, bits(&[PermissionKind::Read, PermissionKind::Share]), Expiry::At(until))
        .unwrap();

    store.replace(&key, GrantRecord::permanent(bits(&[PermissionKind::Comment]))).unwrap();
    let rec = store.get(&key).unwrap().unwrap();
    assert_eq!(rec.bits, bits(&[PermissionKind::Comment]));
    assert_eq!(rec.expires_at, None);
}

#[test]
fn clear_bits_keeps_the_row_and_delete_drops_it() {
    let (_dir, store) = open();
    let key = ScopeKey::resource("t1", "u1", "doc", "d1");
    store.merge(&key, bits(&[PermissionKind::Read, PermissionKind::Edit]), Expiry::Keep).unwrap();

    let rec = store.clear_bits(&key, bits(&[PermissionKind::Edit])).unwrap().unwrap();
    assert_eq!(rec.bits, bits(&[PermissionKind::Read]));

    // Clearing the last bit leaves an empty row behind.
    let rec = store.clear_bits(&key, bits(&[PermissionKind::Read])).unwrap().unwrap();
    assert!(rec.bits.is_empty());
    assert!(store.get(&key).unwrap().is_some());

    // Absent rows are not conjured into existence.
    let missing = ScopeKey::tenant("t1", "nobody");
    assert!(store.clear_bits(&missing, bits(&[PermissionKind::Read])).unwrap().is_none());
    assert!(store.get(&missing).unwrap().is_none());

    assert!(store.delete(&key).unwrap());
    assert!(store.get(&key).unwrap().is_none());
    assert!(!store.delete(&key).unwrap());
}

#[test]
fn deleting_a_resource_row_clears_the_reverse_index_too() {
    let (_dir, store) = open();
    for user in ["u1", "u2"] {
        let key = ScopeKey::resource("t1", user, "doc", "d1");
        store.merge(&key, bits(&[PermissionKind::Read]), Expiry::Keep).unwrap();
    }

    store.delete(&ScopeKey::resource("t1", "u1", "doc", "d1")).unwrap();
    let left = store.resource_grants("t1", "doc", "d1").unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].0, ScopeKey::resource("t1", "u2", "doc", "d1"));
}

#[test]
fn user_grants_spans_tenant_content_type_and_resource_rows() {
    let (_dir, store) = open();
    let mine = [
        ScopeKey::tenant("t1", "u1"),
        ScopeKey::content_type("t1", "u1", "Document"),
        ScopeKey::content_type("t1", "u1", "Comment"),
        ScopeKey::resource("t1", "u1", "doc", "d1"),
        ScopeKey::resource("t1", "u1", "task", "k9"),
    ];
    for key in &mine {
        store.merge(key, bits(&[PermissionKind::Read]), Expiry::Keep).unwrap();
    }
    // Neighboring rows that must not leak in.
    store.merge(&ScopeKey::tenant("t1", "u2"), bits(&[PermissionKind::Edit]), Expiry::Keep).unwrap();
    store
        .merge(&ScopeKey::resource("t2", "u1", "doc", "d1"), bits(&[PermissionKind::Edit]), Expiry::Keep)
        .unwrap();
    store.merge(&ScopeKey::tenant_default("t1"), bits(&[PermissionKind::Edit]), Expiry::Keep).unwrap();

    let listed: HashSet<ScopeKey> =
        store.user_grants("t1", "u1").unwrap().into_iter().map(|(k, _)| k).collect();
    assert_eq!(listed, mine.iter().cloned().collect());
}

#[test]
fn resource_grants_scans_only_the_asked_entity() {
    let (_dir, store) = open();
    for user in ["u1", "u2", "u3"] {
        let key = ScopeKey::resource("t1", user, "doc", "d1");
        store.merge(&key, bits(&[PermissionKind::Read]), Expiry::Keep).unwrap();
    }
    // Same id under a different kind, and under a different tenant.
    store
        .merge(&ScopeKey::resource("t1", "u9", "task", "d1"), bits(&[PermissionKind::Read]), Expiry::Keep)
        .unwrap();
    store
        .merge(&ScopeKey::resource("t2", "u9", "doc", "d1"), bits(&[PermissionKind::Read]), Expiry::Keep)
        .unwrap();

    let users: HashSet<String> = store
        .resource_grants("t1", "doc", "d1")
        .unwrap()
        .into_iter()
        .filter_map(|(k, _)| k.user_id().map(str::to_string))
        .collect();
    assert_eq!(users, ["u1", "u2", "u3"].iter().map(|s| s.to_string()).collect());
}

#[test]
fn purge_counts_each_dead_row_once() {
    let (_dir, store) = open();
    let past = ms(Utc::now() - Duration::hours(1));

    store.merge(&ScopeKey::tenant("t1", "u1"), bits(&[PermissionKind::Read]), Expiry::Keep).unwrap();
    store
        .merge(&ScopeKey::tenant("t1", "dead"), bits(&[PermissionKind::Read]), Expiry::At(past))
        .unwrap();
    // A resource row spans the forward and reverse databases but counts once.
    store
        .merge(
            &ScopeKey::resource("t1", "dead", "doc", "d1"),
            bits(&[PermissionKind::Edit]),
            Expiry::At(past),
        )
        .unwrap();
    // Revoked-to-empty rows are dead weight as well.
    store.merge(&ScopeKey::tenant_default("t1"), bits(&[PermissionKind::Read]), Expiry::Keep).unwrap();
    store.clear_bits(&ScopeKey::tenant_default("t1"), bits(&[PermissionKind::Read])).unwrap();

    assert_eq!(store.purge_expired(Utc::now()).unwrap(), 3);

    assert!(store.get(&ScopeKey::tenant("t1", "u1")).unwrap().is_some());
    assert!(store.get(&ScopeKey::tenant("t1", "dead")).unwrap().is_none());
    assert!(store.get(&ScopeKey::tenant_default("t1")).unwrap().is_none());
    assert!(store.resource_grants("t1", "doc", "d1").unwrap().is_empty());
}

#[test]
fn records_survive_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let key = ScopeKey::resource("t1", "u1", "doc", "d1");
    let until = ms(Utc::now() + Duration::days(30));

    {
        let store = LmdbStore::open(dir.path()).unwrap();
        store
            .merge(&key, bits(&[PermissionKind::Read, PermissionKind::Edit]), Expiry::At(until))
            .unwrap();
    }

    let store = LmdbStore::open(dir.path()).unwrap();
    let rec = store.get(&key).unwrap().unwrap();
    assert_eq!(rec.bits, bits(&[PermissionKind::Read, PermissionKind::Edit]));
    assert_eq!(rec.expires_at, Some(until));
    assert_eq!(store.resource_grants("t1", "doc", "d1").unwrap().len(), 1);
}

#[test]
fn concurrent_merges_union_on_disk() {
    let (_dir, store) = open();
    let key = ScopeKey::tenant("t1", "u1");

    thread::scope(|s| {
        for kind in PermissionKind::ALL {
            let store = &store;
            let key = &key;
            s.spawn(move || {
                for _ in 0..20 {
                    store.merge(key, PermissionSet::from(kind), Expiry::Keep).unwrap();
                }
            });
        }
    });

    assert_eq!(store.get(&key).unwrap().unwrap().bits, PermissionSet::all());
}

#[test]
fn the_engine_reads_the_same_answers_from_lmdb() {
    let dir = tempfile::tempdir().unwrap();
    let kinds = KindRegistry::new().with(EntityKindDescriptor::new("doc", "Document"));
    let engine = Engine::with_registry(
        LmdbStore::open(dir.path()).unwrap(),
        kinds,
        OperationTable::new(),
    );
    let ctx = AccessContext::new("u1", "t1");

    engine.grant(&ScopeKey::tenant("t1", "u1"), bits(&[PermissionKind::Read]), Expiry::Keep).unwrap();
    engine
        .grant(
            &ScopeKey::resource("t1", "u1", "doc", "d1"),
            bits(&[PermissionKind::Edit]),
            Expiry::Keep,
        )
        .unwrap();

    assert!(engine.is_granted(&ctx, PermissionKind::Edit, &Target::resource("doc", "d1")).unwrap());
    assert!(!engine.is_granted(&ctx, PermissionKind::Edit, &Target::resource("doc", "d2")).unwrap());
    assert!(engine.is_granted(&ctx, PermissionKind::Read, &Target::resource("doc", "d2")).unwrap());

    let requested = bits(&[PermissionKind::Read, PermissionKind::Edit]);
    let out = engine.bulk_resolve(&ctx, "doc", &["d1", "d2"], requested).unwrap();
    assert_eq!(out["d1"], requested);
    assert_eq!(out["d2"], bits(&[PermissionKind::Read]));
}

#[test]
fn oversize_ids_are_refused_and_max_length_ids_survive_intact() {
    let dir = tempfile::tempdir().unwrap();
    let kinds = KindRegistry::new().with(EntityKindDescriptor::new("doc", "Document"));
    let engine = Engine::with_registry(
        LmdbStore::open(dir.path()).unwrap(),
        kinds,
        OperationTable::new(),
    );
    let ctx = AccessContext::new("u1", "t1");

    // Over the one-byte length prefix: refused up front, nothing written.
    // Truncating instead would store a key naming a different resource.
    let long = "a".repeat(300);
    let err = engine
        .grant(
            &ScopeKey::resource("t1", "u1", "doc", long.as_str()),
            bits(&[PermissionKind::Read]),
            Expiry::Keep,
        )
        .unwrap_err();
    assert_eq!(err, EngineError::InvalidTarget("resource id"));
    assert!(engine.grants_for_user(&ctx).unwrap().is_empty());

    // Exactly at the bound: stored, resolved and audit-listed verbatim.
    let max = "a".repeat(MAX_PART_LEN);
    let key = ScopeKey::resource("t1", "u1", "doc", max.as_str());
    engine.grant(&key, bits(&[PermissionKind::Read]), Expiry::Keep).unwrap();
    assert!(engine
        .is_granted(&ctx, PermissionKind::Read, &Target::resource("doc", max.as_str()))
        .unwrap());

    let listed = engine.grants_for_user(&ctx).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].0, key);
    assert_eq!(engine.resource_collaborators("t1", "doc", max.as_str()).unwrap().len(), 1);
}

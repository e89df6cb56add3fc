//! Effective permission aggregation: the additive union across scopes,
//! for affordance queries.

use chrono::{Duration, Utc};
use scopebit::{
    AccessContext, Engine, EntityKindDescriptor, Expiry, KindRegistry, MemoryStore, OperationTable,
    PermissionKind, PermissionSet, ScopeKey, Target,
};

fn engine() -> Engine<MemoryStore> {
    let kinds = KindRegistry::new().with(EntityKindDescriptor::new("doc", "Document"));
    Engine::with_registry(MemoryStore::new(), kinds, OperationTable::new())
}

fn bits(kinds: &[PermissionKind]) -> PermissionSet {
    PermissionSet::of(kinds)
}

#[test]
fn unions_every_live_scope_the_target_reaches() {
    let engine = engine();
    engine.grant(&ScopeKey::global(), bits(&[PermissionKind::Vote]), Expiry::Keep).unwrap();
    engine
        .grant(&ScopeKey::tenant_default("t1"), bits(&[PermissionKind::Download]), Expiry::Keep)
        .unwrap();
    engine
        .grant(&ScopeKey::tenant("t1", "u1"), bits(&[PermissionKind::Read]), Expiry::Keep)
        .unwrap();
    engine
        .grant(
            &ScopeKey::content_type("t1", "u1", "Document"),
            bits(&[PermissionKind::Comment]),
            Expiry::Keep,
        )
        .unwrap();
    engine
        .grant(
            &ScopeKey::resource("t1", "u1", "doc", "d1"),
            bits(&[PermissionKind::Edit]),
            Expiry::Keep,
        )
        .unwrap();

    let ctx = AccessContext::new("u1", "t1");
    let effective =
        engine.effective_permissions(&ctx, &Target::resource("doc", "d1")).unwrap();
    assert_eq!(
        effective,
        bits(&[
            PermissionKind::Vote,
            PermissionKind::Download,
            PermissionKind::Read,
            PermissionKind::Comment,
            PermissionKind::Edit,
        ])
    );
}

#[test]
fn expired_grants_never_contribute() {
    let engine = engine();
    engine
        .grant(&ScopeKey::tenant("t1", "u1"), bits(&[PermissionKind::Read]), Expiry::Keep)
        .unwrap();
    engine
        .grant(
            &ScopeKey::resource("t1", "u1", "doc", "d1"),
            bits(&[PermissionKind::Edit, PermissionKind::Delete]),
            Expiry::At(Utc::now() - Duration::minutes(5)),
        )
        .unwrap();

    let ctx = AccessContext::new("u1", "t1");
    let effective =
        engine.effective_permissions(&ctx, &Target::resource("doc", "d1")).unwrap();
    assert_eq!(effective, bits(&[PermissionKind::Read]));
}

#[test]
fn the_union_narrows_with_the_target() {
    let engine = engine();
    engine
        .grant(&ScopeKey::tenant("t1", "u1"), bits(&[PermissionKind::Read]), Expiry::Keep)
        .unwrap();
    engine
        .grant(
            &ScopeKey::content_type("t1", "u1", "Document"),
            bits(&[PermissionKind::Comment]),
            Expiry::Keep,
        )
        .unwrap();
    engine
        .grant(
            &ScopeKey::resource("t1", "u1", "doc", "d1"),
            bits(&[PermissionKind::Edit]),
            Expiry::Keep,
        )
        .unwrap();

    let ctx = AccessContext::new("u1", "t1");

    // Tenant-wide question: neither the resource nor content-type bits show.
    let effective = engine.effective_permissions(&ctx, &Target::tenant_wide()).unwrap();
    assert_eq!(effective, bits(&[PermissionKind::Read]));

    // Content-type question adds that layer but not the resource.
    let effective =
        engine.effective_permissions(&ctx, &Target::content_type("Document")).unwrap();
    assert_eq!(effective, bits(&[PermissionKind::Read, PermissionKind::Comment]));

    // Empty everywhere for a stranger.
    let effective = engine
        .effective_permissions(&AccessContext::new("u9", "t1"), &Target::tenant_wide())
        .unwrap();
    assert!(effective.is_empty());
}

#[test]
fn aggregate_membership_agrees_with_per_permission_resolution() {
    let engine = engine();
    engine
        .grant(&ScopeKey::tenant("t1", "u1"), bits(&[PermissionKind::Read]), Expiry::Keep)
        .unwrap();
    engine
        .grant(
            &ScopeKey::resource("t1", "u1", "doc", "d1"),
            bits(&[PermissionKind::Edit, PermissionKind::Share]),
            Expiry::Keep,
        )
        .unwrap();

    let ctx = AccessContext::new("u1", "t1");
    let target = Target::resource("doc", "d1");
    let effective = engine.effective_permissions(&ctx, &target).unwrap();

    for permission in PermissionKind::ALL {
        let resolved = engine.resolve(&ctx, permission, &target).unwrap().is_granted();
        assert_eq!(effective.contains(permission), resolved, "disagree on {permission}");
    }

    // The affordance surface: names for the UI layer.
    assert_eq!(effective.names(), vec!["read", "edit", "share"]);
}

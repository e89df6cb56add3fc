//! Kind registry and operation table contracts: startup registration,
//! per-operation gating, and target shape enforcement.

use scopebit::{
    AccessContext, Decision, Engine, EngineError, EntityKindDescriptor, Expiry, KindRegistry,
    MemoryStore, OperationTable, PermissionKind, PermissionSet, ScopeKey, ScopeKind, Target,
    TargetShape,
};

fn engine() -> Engine<MemoryStore> {
    let kinds = KindRegistry::new()
        .with(EntityKindDescriptor::new("doc", "Document"))
        .with(EntityKindDescriptor::new("board", "Board"));
    let ops = OperationTable::new()
        .with("doc.publish", PermissionKind::Publish, TargetShape::Resource)
        .with("doc.draft", PermissionKind::Draft, TargetShape::ContentType)
        .with("workspace.invite", PermissionKind::ManageCollaborators, TargetShape::TenantWide);
    Engine::with_registry(MemoryStore::new(), kinds, ops)
}

fn ctx() -> AccessContext {
    AccessContext::new("u1", "t1")
}

#[test]
fn operations_gate_through_their_registered_permission() {
    let engine = engine();
    engine
        .grant(
            &ScopeKey::resource("t1", "u1", "doc", "d1"),
            PermissionSet::of(&[PermissionKind::Publish]),
            Expiry::Keep,
        )
        .unwrap();

    let d = engine.resolve_operation(&ctx(), "doc.publish", &Target::resource("doc", "d1")).unwrap();
    assert_eq!(d, Decision::Granted { scope: ScopeKind::Resource });

    // Holding Publish on d1 says nothing about d2.
    let d = engine.resolve_operation(&ctx(), "doc.publish", &Target::resource("doc", "d2")).unwrap();
    assert_eq!(d, Decision::Denied);
}

#[test]
fn unknown_operations_are_contract_errors() {
    let engine = engine();
    let err = engine
        .resolve_operation(&ctx(), "doc.frobnicate", &Target::resource("doc", "d1"))
        .unwrap_err();
    assert_eq!(err, EngineError::UnknownOperation("doc.frobnicate".into()));
}

#[test]
fn operations_demand_their_target_shape() {
    let engine = engine();

    // A resource-shaped operation refuses a tenant-wide question.
    let err = engine.resolve_operation(&ctx(), "doc.publish", &Target::tenant_wide()).unwrap_err();
    assert!(matches!(err, EngineError::InvalidTarget(_)));

    // Content-type-shaped accepts either a content type or a resource.
    engine
        .grant(
            &ScopeKey::content_type("t1", "u1", "Document"),
            PermissionSet::of(&[PermissionKind::Draft]),
            Expiry::Keep,
        )
        .unwrap();
    assert!(engine
        .resolve_operation(&ctx(), "doc.draft", &Target::content_type("Document"))
        .unwrap()
        .is_granted());
    assert!(engine
        .resolve_operation(&ctx(), "doc.draft", &Target::resource("doc", "d1"))
        .unwrap()
        .is_granted());
    let err = engine.resolve_operation(&ctx(), "doc.draft", &Target::tenant_wide()).unwrap_err();
    assert!(matches!(err, EngineError::InvalidTarget(_)));

    // Tenant-wide operations take any shape.
    engine
        .grant(
            &ScopeKey::tenant("t1", "u1"),
            PermissionSet::of(&[PermissionKind::ManageCollaborators]),
            Expiry::Keep,
        )
        .unwrap();
    assert!(engine
        .resolve_operation(&ctx(), "workspace.invite", &Target::tenant_wide())
        .unwrap()
        .is_granted());
    assert!(engine
        .resolve_operation(&ctx(), "workspace.invite", &Target::resource("doc", "d1"))
        .unwrap()
        .is_granted());
}

#[test]
fn registries_are_startup_data() {
    let mut kinds = KindRegistry::new();
    assert!(kinds.is_empty());
    kinds.register(EntityKindDescriptor::new("doc", "Document"));
    kinds.register(EntityKindDescriptor::new("doc", "Article"));
    // Re-registration replaces the descriptor.
    assert_eq!(kinds.len(), 1);
    assert_eq!(kinds.content_type_of("doc").unwrap(), "Article");
    assert_eq!(
        kinds.content_type_of("nope").unwrap_err(),
        EngineError::UnknownEntityKind("nope".into())
    );

    let mut ops = OperationTable::new();
    assert!(ops.get("x").is_none());
    ops.register("x", scopebit::OperationRequirement::new(PermissionKind::Read, TargetShape::TenantWide));
    assert_eq!(ops.len(), 1);
    assert_eq!(ops.require("x").unwrap().permission, PermissionKind::Read);
    assert_eq!(ops.require("y").unwrap_err(), EngineError::UnknownOperation("y".into()));
}

#[test]
fn an_empty_kind_registry_still_serves_explicit_content_types() {
    // Without registration, resource targets cannot derive a content type,
    // but an explicit one works.
    let engine = Engine::new(MemoryStore::new());
    engine
        .grant(
            &ScopeKey::content_type("t1", "u1", "Document"),
            PermissionSet::of(&[PermissionKind::Read]),
            Expiry::Keep,
        )
        .unwrap();

    assert!(engine
        .resolve(&ctx(), PermissionKind::Read, &Target::content_type("Document"))
        .unwrap()
        .is_granted());

    let err = engine
        .resolve(&ctx(), PermissionKind::Read, &Target::resource("doc", "d1"))
        .unwrap_err();
    assert_eq!(err, EngineError::UnknownEntityKind("doc".into()));

    // An explicit content type overrides which type is consulted, but the
    // kind itself still has to be registered.
    let err = engine
        .resolve(
            &ctx(),
            PermissionKind::Read,
            &Target::resource("doc", "d1").with_content_type("Document"),
        )
        .unwrap_err();
    assert_eq!(err, EngineError::UnknownEntityKind("doc".into()));
}

#[test]
fn descriptor_content_types_are_checked_like_caller_input() {
    // Registration takes startup data as-is; the checks run where the
    // descriptor's content type would reach a storage key.
    let kinds = KindRegistry::new().with(EntityKindDescriptor::new("doc", "D".repeat(300)));
    let engine = Engine::with_registry(MemoryStore::new(), kinds, OperationTable::new());

    let err = engine
        .resolve(&ctx(), PermissionKind::Read, &Target::resource("doc", "d1"))
        .unwrap_err();
    assert_eq!(err, EngineError::InvalidTarget("content type"));

    let err = engine.bulk_resolve(&ctx(), "doc", &["d1"], PermissionSet::all()).unwrap_err();
    assert_eq!(err, EngineError::InvalidTarget("content type"));

    // An explicit override sidesteps the bad descriptor.
    assert_eq!(
        engine
            .resolve(
                &ctx(),
                PermissionKind::Read,
                &Target::resource("doc", "d1").with_content_type("Document"),
            )
            .unwrap(),
        Decision::Denied
    );
}

//! Startup-time registries: entity kinds and gated operations.
//!
//! Both are plain maps resolved once while the application assembles its
//! [`Engine`]. Lookups at request time are a single hash probe, and a miss
//! is a contract error, never a silent denial: an unregistered kind or
//! operation means the caller and the deployment disagree about what
//! exists.
//!
//! [`Engine`]: crate::engine::Engine

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::bits::PermissionKind;
use crate::error::EngineError;

/// One entity kind the engine can resolve resource grants for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityKindDescriptor {
    /// Kind name, the namespace for resource ids.
    pub name: String,
    /// Content type consulted at the content-type step for this kind's
    /// resources, unless the request overrides it.
    pub content_type: String,
}

impl EntityKindDescriptor {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>) -> Self {
        EntityKindDescriptor { name: name.into(), content_type: content_type.into() }
    }
}

/// Entity kinds known to the engine, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    kinds: HashMap<String, EntityKindDescriptor>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form for startup assembly.
    pub fn with(mut self, descriptor: EntityKindDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    /// Register a kind; re-registering a name replaces its descriptor.
    pub fn register(&mut self, descriptor: EntityKindDescriptor) {
        self.kinds.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, kind: &str) -> Option<&EntityKindDescriptor> {
        self.kinds.get(kind)
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Content type for a kind, or the contract error for unknown kinds.
    pub fn content_type_of(&self, kind: &str) -> Result<&str, EngineError> {
        self.kinds
            .get(kind)
            .map(|d| d.content_type.as_str())
            .ok_or_else(|| EngineError::UnknownEntityKind(kind.to_string()))
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// How an operation must be addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetShape {
    /// Needs a concrete resource in the target.
    Resource,
    /// Needs at least a content type.
    ContentType,
    /// Tenant-wide; any target shape acceptable.
    TenantWide,
}

/// What one registered operation demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRequirement {
    pub permission: PermissionKind,
    pub scope: TargetShape,
}

impl OperationRequirement {
    pub fn new(permission: PermissionKind, scope: TargetShape) -> Self {
        OperationRequirement { permission, scope }
    }
}

/// Operation id to requirement mapping, resolved once at startup.
#[derive(Debug, Clone, Default)]
pub struct OperationTable {
    ops: HashMap<String, OperationRequirement>,
}

impl OperationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form for startup assembly.
    pub fn with(
        mut self,
        op: impl Into<String>,
        permission: PermissionKind,
        scope: TargetShape,
    ) -> Self {
        self.register(op, OperationRequirement::new(permission, scope));
        self
    }

    pub fn register(&mut self, op: impl Into<String>, requirement: OperationRequirement) {
        self.ops.insert(op.into(), requirement);
    }

    pub fn get(&self, op: &str) -> Option<&OperationRequirement> {
        self.ops.get(op)
    }

    /// Requirement for `op`, or the contract error for unknown operations.
    pub fn require(&self, op: &str) -> Result<&OperationRequirement, EngineError> {
        self.ops.get(op).ok_or_else(|| EngineError::UnknownOperation(op.to_string()))
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
